//! TCP transport: accept loop and connector.

use std::{io, net::SocketAddr, sync::Arc};

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{Instrument, debug, info, info_span, warn};
use trackwire_net_codec::FramedChannel;
use trackwire_net_tracker::Tracker;

use crate::{Processor, RpcClient, RpcError, Service};

/// A framed channel over a TCP stream.
pub type TcpChannel = FramedChannel<Compat<TcpStream>>;

/// Produces a fresh tracker for every accepted connection.
pub type TrackerFactory = Arc<dyn Fn() -> Arc<dyn Tracker> + Send + Sync>;

/// Accepts connections and runs a [`Processor`] on each.
pub struct TcpServer<S> {
    listener: TcpListener,
    service: Arc<S>,
    trackers: Option<TrackerFactory>,
}

impl<S: Service> TcpServer<S> {
    /// Bind a server that does not take part in tracking.
    pub async fn bind(addr: impl ToSocketAddrs, service: Arc<S>) -> Result<Self, RpcError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            service,
            trackers: None,
        })
    }

    pub fn with_trackers(
        mut self,
        factory: impl Fn() -> Arc<dyn Tracker> + Send + Sync + 'static,
    ) -> Self {
        self.trackers = Some(Arc::new(factory));
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, one task per connection.
    pub async fn run(self) -> Result<(), RpcError> {
        info!(addr = %self.listener.local_addr()?, tracking = self.trackers.is_some(), "Serving");
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let processor = match &self.trackers {
                Some(factory) => Processor::new(Arc::clone(&self.service), factory()),
                None => Processor::legacy(Arc::clone(&self.service)),
            };
            debug!(%peer, "Accepted connection");
            tokio::spawn(
                async move {
                    let channel = FramedChannel::new(stream.compat());
                    if let Err(e) = processor.serve(channel).await {
                        warn!(error = %e, "Connection failed");
                    }
                }
                .instrument(info_span!("connection", %peer)),
            );
        }
    }
}

/// Open a client connection to `addr`.
///
/// Tracking is negotiated on the first call, not here.
pub async fn connect(
    addr: impl ToSocketAddrs,
    tracker: Arc<dyn Tracker>,
) -> Result<RpcClient<TcpChannel>, RpcError> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(RpcClient::new(FramedChannel::new(stream.compat()), tracker))
}
