//! Observer callbacks fired by a tracker.

use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use tracing::{debug, warn};

use crate::{RequestHeader, UpgradeArgs};

pub type HandshakeHook = dyn Fn(&UpgradeArgs) + Send + Sync;
pub type HeaderHook = dyn Fn(&RequestHeader) + Send + Sync;

/// Side-effect-only observers.
///
/// A hook cannot influence negotiation or fail a call: a panicking hook is
/// caught and logged.
#[derive(Clone)]
pub struct Hooks {
    on_handshake_request: Arc<HandshakeHook>,
    on_header_received: Arc<HeaderHook>,
}

impl Hooks {
    /// Hooks that do nothing.
    pub fn noop() -> Self {
        Self {
            on_handshake_request: Arc::new(|_| {}),
            on_header_received: Arc::new(|_| {}),
        }
    }

    /// Hooks that log every handshake request and received header at debug level.
    pub fn logging() -> Self {
        Self {
            on_handshake_request: Arc::new(|args| {
                debug!(app_id = %args.app_id, version = args.version, "Handshake request");
            }),
            on_header_received: Arc::new(|header| {
                debug!(
                    request_id = %header.request_id,
                    seq = %header.seq,
                    meta = ?header.meta,
                    "Request header received"
                );
            }),
        }
    }

    pub fn with_on_handshake_request(
        mut self,
        hook: impl Fn(&UpgradeArgs) + Send + Sync + 'static,
    ) -> Self {
        self.on_handshake_request = Arc::new(hook);
        self
    }

    pub fn with_on_header_received(
        mut self,
        hook: impl Fn(&RequestHeader) + Send + Sync + 'static,
    ) -> Self {
        self.on_header_received = Arc::new(hook);
        self
    }

    pub(crate) fn handshake_request(&self, args: &UpgradeArgs) {
        fire("on_handshake_request", || (self.on_handshake_request)(args));
    }

    pub(crate) fn header_received(&self, header: &RequestHeader) {
        fire("on_header_received", || (self.on_header_received)(header));
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self::logging()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

fn fire(hook: &'static str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        warn!(hook, "Tracker hook panicked");
    }
}
