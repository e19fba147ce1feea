//! Capability traits implemented by trackers.

use async_trait::async_trait;
use trackwire_net_codec::{MessageChannel, MessageIdentifier, ProtocolReader, ProtocolWriter};

use crate::{CallContext, ProtocolVersion, RequestHeader, TrackerError};

/// Negotiates the tracking version of one connection.
#[async_trait]
pub trait HandShaker: Send + Sync {
    /// Client side: run the handshake as call `seq_id` on `channel`.
    ///
    /// Succeeds without enabling anything when the peer does not know the
    /// handshake method.
    async fn negotiate(
        &self,
        seq_id: i32,
        channel: &mut dyn MessageChannel,
    ) -> Result<(), TrackerError>;

    /// Server side: answer `call` if it is a handshake.
    ///
    /// `body` is positioned after the message envelope. Returns `true` when the
    /// call was a handshake and has been replied to, `false` when it must be
    /// dispatched normally.
    async fn try_upgrade(
        &self,
        call: &MessageIdentifier,
        body: &mut ProtocolReader,
        channel: &mut dyn MessageChannel,
    ) -> Result<bool, TrackerError>;

    /// The version currently in effect.
    fn version(&self) -> ProtocolVersion;

    fn request_header_supported(&self) -> bool {
        self.version() >= ProtocolVersion::RequestHeader
    }

    /// Reserved tier; no implementation exchanges response headers yet.
    fn response_header_supported(&self) -> bool {
        self.version() >= ProtocolVersion::RequestResponseHeader
    }
}

/// Header exchange on top of a negotiated connection.
pub trait Tracker: HandShaker {
    /// Read the header in front of a call's arguments, if the connection
    /// carries one. Reads nothing and returns `None` otherwise.
    fn try_read_request_header(
        &self,
        body: &mut ProtocolReader,
    ) -> Result<Option<RequestHeader>, TrackerError>;

    /// Write the header for a call issued from within `ctx`, if the connection
    /// carries one. Writes nothing otherwise.
    fn try_write_request_header(
        &self,
        ctx: &CallContext,
        out: &mut ProtocolWriter,
    ) -> Result<(), TrackerError>;
}
