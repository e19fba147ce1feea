//! RPC plumbing for tracked Thrift-style connections.
//!
//! [`RpcClient`] issues calls over any [`MessageChannel`], negotiating request
//! tracking before its first call. [`Processor`] is the matching server side:
//! it answers handshakes, lifts the request header into a [`CallContext`] and
//! dispatches to a [`Service`] with that context installed.
//!
//! [`MessageChannel`]: trackwire_net_codec::MessageChannel
//! [`CallContext`]: trackwire_net_tracker::CallContext

mod client;
mod error;
mod processor;
mod tcp;

pub use client::RpcClient;
pub use error::RpcError;
pub use processor::{Processor, Service};
pub use tcp::{TcpChannel, TcpServer, TrackerFactory, connect};
