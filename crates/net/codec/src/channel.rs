//! Message channels: the transport a tracker and an RPC client or processor
//! talk through.

use asynchronous_codec::Framed;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{
    AsyncRead, AsyncWrite, SinkExt, StreamExt, TryStreamExt,
    channel::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use tracing::trace;

use crate::{CodecError, FrameCodec};

/// A bidirectional channel of complete message frames.
///
/// `send` both writes and flushes one message; `recv` yields the next message
/// sent by the peer. Timeouts and cancellation are the implementor's concern.
#[async_trait]
pub trait MessageChannel: Send {
    async fn send(&mut self, message: Bytes) -> Result<(), CodecError>;

    /// Fails with [`CodecError::ConnectionClosed`] once the peer is gone.
    async fn recv(&mut self) -> Result<Bytes, CodecError>;
}

#[async_trait]
impl<C: MessageChannel + ?Sized> MessageChannel for Box<C> {
    async fn send(&mut self, message: Bytes) -> Result<(), CodecError> {
        (**self).send(message).await
    }

    async fn recv(&mut self) -> Result<Bytes, CodecError> {
        (**self).recv().await
    }
}

/// A channel over any byte stream, framed with [`FrameCodec`].
pub struct FramedChannel<S> {
    framed: Framed<S, FrameCodec>,
}

impl<S> FramedChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self::with_codec(stream, FrameCodec::default())
    }

    pub fn with_codec(stream: S, codec: FrameCodec) -> Self {
        Self {
            framed: Framed::new(stream, codec),
        }
    }

    pub fn into_inner(self) -> S {
        self.framed.into_inner()
    }
}

#[async_trait]
impl<S> MessageChannel for FramedChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, message: Bytes) -> Result<(), CodecError> {
        trace!(len = message.len(), "Sending frame");
        self.framed.send(message).await
    }

    async fn recv(&mut self) -> Result<Bytes, CodecError> {
        let frame = self
            .framed
            .try_next()
            .await?
            .ok_or(CodecError::ConnectionClosed)?;
        trace!(len = frame.len(), "Received frame");
        Ok(frame)
    }
}

/// One end of an in-process channel pair.
#[derive(Debug)]
pub struct MemoryChannel {
    tx: UnboundedSender<Bytes>,
    rx: UnboundedReceiver<Bytes>,
}

/// Create two connected in-memory channel ends.
pub fn memory_pair() -> (MemoryChannel, MemoryChannel) {
    let (a_tx, a_rx) = mpsc::unbounded();
    let (b_tx, b_rx) = mpsc::unbounded();
    (
        MemoryChannel { tx: a_tx, rx: b_rx },
        MemoryChannel { tx: b_tx, rx: a_rx },
    )
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn send(&mut self, message: Bytes) -> Result<(), CodecError> {
        self.tx
            .unbounded_send(message)
            .map_err(|_| CodecError::ConnectionClosed)
    }

    async fn recv(&mut self) -> Result<Bytes, CodecError> {
        self.rx.next().await.ok_or(CodecError::ConnectionClosed)
    }
}
