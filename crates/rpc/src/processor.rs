//! Server side of a tracked connection.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, trace, warn};
use trackwire_net_codec::{
    ApplicationException, CodecError, ExceptionKind, MessageChannel, MessageIdentifier,
    MessageType, ProtocolReader, ProtocolWriter, WireStruct,
};
use trackwire_net_tracker::{CallContext, Tracker};

use crate::RpcError;

/// Handler for the calls of one service.
///
/// `args` is positioned at the call's argument struct. The returned writer
/// holds the encoded result struct; the processor wraps it in the reply
/// envelope. Methods the service does not know should answer
/// [`ApplicationException::unknown_method`].
#[async_trait]
pub trait Service: Send + Sync + 'static {
    async fn call(
        &self,
        ctx: CallContext,
        method: &str,
        args: &mut ProtocolReader,
    ) -> Result<ProtocolWriter, ApplicationException>;
}

/// Dispatch loop for one connection.
///
/// Without a tracker the processor behaves like a server that predates
/// tracking: the handshake reaches the service like any other call.
pub struct Processor<S> {
    service: Arc<S>,
    tracker: Option<Arc<dyn Tracker>>,
}

impl<S> Clone for Processor<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            tracker: self.tracker.clone(),
        }
    }
}

impl<S: Service> Processor<S> {
    pub fn new(service: Arc<S>, tracker: Arc<dyn Tracker>) -> Self {
        Self {
            service,
            tracker: Some(tracker),
        }
    }

    pub fn legacy(service: Arc<S>) -> Self {
        Self {
            service,
            tracker: None,
        }
    }

    pub fn tracker(&self) -> Option<&Arc<dyn Tracker>> {
        self.tracker.as_ref()
    }

    /// Handle calls until the peer closes the channel.
    pub async fn serve<C: MessageChannel>(&self, mut channel: C) -> Result<(), RpcError> {
        loop {
            let frame = match channel.recv().await {
                Ok(frame) => frame,
                Err(CodecError::ConnectionClosed) => {
                    debug!("Peer closed connection");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            self.process(frame, &mut channel).await?;
        }
    }

    /// Handle one received message.
    ///
    /// Errors that leave the connection in an unknown state are answered with
    /// an exception where possible and then returned.
    pub async fn process(
        &self,
        frame: Bytes,
        channel: &mut dyn MessageChannel,
    ) -> Result<(), RpcError> {
        let mut body = ProtocolReader::new(frame);
        let call = body.read_message_begin()?;
        trace!(method = %call.name, seq_id = call.seq_id, kind = %call.kind, "Received message");

        if !matches!(call.kind, MessageType::Call | MessageType::Oneway) {
            let exc = ApplicationException::new(
                ExceptionKind::InvalidMessageType,
                format!("unexpected message type {}", call.kind),
            );
            reply(&call, Err(exc), channel).await?;
            return Err(RpcError::InvalidMessageType(call.kind));
        }

        let ctx = match &self.tracker {
            Some(tracker) => {
                if tracker.try_upgrade(&call, &mut body, channel).await? {
                    return Ok(());
                }
                match tracker.try_read_request_header(&mut body) {
                    Ok(header) => header.map(CallContext::from).unwrap_or_default(),
                    Err(e) => {
                        warn!(method = %call.name, error = %e, "Bad request header");
                        if call.kind != MessageType::Oneway {
                            reply(&call, Err(e.to_application_exception()), channel).await?;
                        }
                        return Err(e.into());
                    }
                }
            }
            None => CallContext::default(),
        };

        let result = ctx
            .clone()
            .scope(self.service.call(ctx, &call.name, &mut body))
            .await;
        if let Err(exc) = &result {
            debug!(method = %call.name, error = %exc, "Call answered with exception");
        }

        if call.kind == MessageType::Oneway {
            return Ok(());
        }
        reply(&call, result, channel).await
    }
}

async fn reply(
    call: &MessageIdentifier,
    result: Result<ProtocolWriter, ApplicationException>,
    channel: &mut dyn MessageChannel,
) -> Result<(), RpcError> {
    let mut out = ProtocolWriter::new();
    match result {
        Ok(body) => {
            out.write_message_begin(&MessageIdentifier::new(
                call.name.as_str(),
                MessageType::Reply,
                call.seq_id,
            ))?;
            out.append(body);
        }
        Err(exc) => {
            out.write_message_begin(&MessageIdentifier::new(
                call.name.as_str(),
                MessageType::Exception,
                call.seq_id,
            ))?;
            exc.write(&mut out)?;
        }
    }
    out.write_message_end()?;
    channel.send(out.freeze()).await?;
    Ok(())
}
