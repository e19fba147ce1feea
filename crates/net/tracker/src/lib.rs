//! Optional request tracking for Thrift-style RPC connections.
//!
//! Two peers may agree, once per connection, to put a small header in front of
//! every call's arguments. The header carries:
//!
//! - a **request id** shared by every call of one logical request chain
//! - a dotted **sequence** locating the call inside that chain (`1`, `1.2`, ...)
//! - free-form **meta** tags
//!
//! Peers that never heard of the extension keep working: the client's
//! handshake is an ordinary call to [`TRACKING_API_NAME`], which an old server
//! answers with an `UnknownMethod` exception, and the header is only written
//! once both sides agreed on [`ProtocolVersion::RequestHeader`].
//!
//! # Usage
//!
//! ```ignore
//! use trackwire_net_tracker::{CallContext, Hooks, SimpleTracker, Tracker, TrackerConfig};
//!
//! let tracker = SimpleTracker::new(TrackerConfig::new("server-A", "server-B"), Hooks::default());
//!
//! // client: before the first call
//! tracker.negotiate(seq_id, &mut channel).await?;
//! // client: every call, between the envelope and the arguments
//! tracker.try_write_request_header(&ctx, &mut out)?;
//!
//! // server: every received call, after the envelope
//! if !tracker.try_upgrade(&call, &mut body, &mut channel).await? {
//!     let ctx = tracker
//!         .try_read_request_header(&mut body)?
//!         .map(CallContext::from)
//!         .unwrap_or_default();
//!     // dispatch with ctx
//! }
//! ```

mod config;
mod context;
mod error;
mod headers;
mod hooks;
mod ids;
mod simple;
mod traits;
mod version;

pub use config::TrackerConfig;
pub use context::CallContext;
pub use error::TrackerError;
pub use headers::{RequestHeader, UpgradeArgs, UpgradeReply};
pub use hooks::{HandshakeHook, HeaderHook, Hooks};
pub use ids::{ROOT_SEQUENCE, derive_request_id, derive_sequence};
pub use simple::SimpleTracker;
pub use traits::{HandShaker, Tracker};
pub use version::ProtocolVersion;

pub(crate) use version::NegotiatedVersion;

/// Reserved method name of the handshake call.
pub const TRACKING_API_NAME: &str = "ElemeThriftTrackingAPI";
