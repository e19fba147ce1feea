//! Host RPC wire layer for trackwire.
//!
//! Provides the pieces an RPC client or server needs to exchange messages with a
//! peer speaking the Thrift strict binary protocol over a framed transport:
//!
//! - [`ProtocolWriter`] / [`ProtocolReader`]: message envelope and structured
//!   encoding of a message body
//! - [`WireStruct`]: payloads that ride inside a message body
//! - [`ApplicationException`]: the exception reply every peer understands
//! - [`FrameCodec`] and [`MessageChannel`]: moving whole messages between peers
//!
//! The tracking extension in `trackwire-net-tracker` builds on these without
//! introducing any new framing: its handshake is an ordinary call and its
//! header is an extra struct inside an ordinary call body.

mod channel;
mod error;
mod exception;
mod frame;
mod message;
mod protocol;
mod wire;

pub use channel::{FramedChannel, MemoryChannel, MessageChannel, memory_pair};
pub use error::CodecError;
pub use exception::{ApplicationException, ExceptionKind};
pub use frame::{DEFAULT_MAX_FRAME_SIZE, FrameCodec};
pub use message::{
    FieldIdentifier, ListIdentifier, MapIdentifier, MessageIdentifier, MessageType, TType,
};
pub use protocol::{MAX_SKIP_DEPTH, ProtocolReader, ProtocolWriter, VERSION_1};
pub use wire::{Void, WireStruct};
