//! Client side of a tracked connection.

use std::sync::Arc;

use tracing::{debug, warn};
use trackwire_net_codec::{
    ApplicationException, MessageChannel, MessageIdentifier, MessageType, ProtocolReader,
    ProtocolWriter, WireStruct,
};
use trackwire_net_tracker::{CallContext, Tracker};

use crate::RpcError;

/// Issues calls over one connection.
///
/// The first call negotiates tracking with the peer. Negotiation is attempted
/// once: if it fails, that call returns the error and the connection carries
/// on without headers.
pub struct RpcClient<C> {
    channel: C,
    tracker: Arc<dyn Tracker>,
    seq_id: i32,
    negotiated: bool,
}

impl<C: MessageChannel> RpcClient<C> {
    pub fn new(channel: C, tracker: Arc<dyn Tracker>) -> Self {
        Self {
            channel,
            tracker,
            seq_id: 0,
            negotiated: false,
        }
    }

    pub fn tracker(&self) -> &Arc<dyn Tracker> {
        &self.tracker
    }

    pub fn into_inner(self) -> C {
        self.channel
    }

    fn next_seq_id(&mut self) -> i32 {
        self.seq_id = self.seq_id.wrapping_add(1);
        self.seq_id
    }

    /// Negotiate tracking unless it was already attempted on this connection.
    pub async fn ensure_negotiated(&mut self) -> Result<(), RpcError> {
        if self.negotiated {
            return Ok(());
        }
        self.negotiated = true;
        let seq_id = self.next_seq_id();
        self.tracker.negotiate(seq_id, &mut self.channel).await?;
        Ok(())
    }

    /// Call `method` with the ambient [`CallContext`], if one is installed.
    pub async fn call<A, R>(&mut self, method: &str, args: &A) -> Result<R, RpcError>
    where
        A: WireStruct + Sync,
        R: WireStruct,
    {
        let ctx = CallContext::current().unwrap_or_default();
        self.call_with(&ctx, method, args).await
    }

    /// Call `method`, deriving the request header from `ctx`.
    pub async fn call_with<A, R>(
        &mut self,
        ctx: &CallContext,
        method: &str,
        args: &A,
    ) -> Result<R, RpcError>
    where
        A: WireStruct + Sync,
        R: WireStruct,
    {
        self.ensure_negotiated().await?;

        let seq_id = self.next_seq_id();
        let mut out = ProtocolWriter::new();
        out.write_message_begin(&MessageIdentifier::new(method, MessageType::Call, seq_id))?;
        self.tracker.try_write_request_header(ctx, &mut out)?;
        args.write(&mut out)?;
        out.write_message_end()?;
        debug!(method, seq_id, "Sending call");
        self.channel.send(out.freeze()).await?;

        let mut input = ProtocolReader::new(self.channel.recv().await?);
        let reply = input.read_message_begin()?;
        if reply.name != method {
            return Err(RpcError::WrongMethodName {
                expected: method.to_string(),
                actual: reply.name,
            });
        }
        if reply.seq_id != seq_id {
            return Err(RpcError::BadSequenceId {
                expected: seq_id,
                actual: reply.seq_id,
            });
        }
        match reply.kind {
            MessageType::Reply => {
                let result = R::read(&mut input)?;
                input.read_message_end()?;
                Ok(result)
            }
            MessageType::Exception => {
                let exc = ApplicationException::read(&mut input)?;
                input.read_message_end()?;
                warn!(method, seq_id, error = %exc, "Call failed remotely");
                Err(RpcError::Remote(exc))
            }
            kind => Err(RpcError::InvalidMessageType(kind)),
        }
    }
}
