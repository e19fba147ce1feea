//! Tracking protocol version tiers and the per-connection negotiated version.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use strum::{Display, FromRepr};

/// Feature tier agreed between two peers.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum ProtocolVersion {
    /// No tracking header on the wire.
    #[default]
    Default = 0,
    /// Request header precedes every call's arguments.
    RequestHeader = 1,
    /// Reserved: request and response headers.
    RequestResponseHeader = 2,
}

impl ProtocolVersion {
    /// Highest tier this implementation stores.
    pub const MAX: Self = Self::RequestHeader;

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// The version negotiated on one connection.
///
/// Read on every call, written by the handshake only.
#[derive(Debug, Default)]
pub(crate) struct NegotiatedVersion {
    inner: RwLock<ProtocolVersion>,
}

impl NegotiatedVersion {
    pub(crate) fn get(&self) -> ProtocolVersion {
        *self.inner.read()
    }

    /// Apply a peer's proposal and return the version to report back.
    ///
    /// A zero proposal means "whatever you support" and becomes `fallback`.
    /// Proposals below the held version or above the reserved top tier are
    /// rejected: the state is left alone and `Default` is returned. The reserved
    /// top tier is accepted but downgraded to `fallback`, since only the request
    /// header is implemented. `fallback` is clamped to [`ProtocolVersion::MAX`].
    pub(crate) fn try_set(&self, proposed: i32, fallback: ProtocolVersion) -> ProtocolVersion {
        let fallback = fallback.min(ProtocolVersion::MAX);
        let mut current = self.inner.write();

        let proposed = if proposed == ProtocolVersion::Default.as_i32() {
            fallback.as_i32()
        } else {
            proposed
        };
        if proposed < current.as_i32()
            || proposed > ProtocolVersion::RequestResponseHeader.as_i32()
        {
            return ProtocolVersion::Default;
        }

        let accepted = match ProtocolVersion::from_repr(proposed) {
            Some(ProtocolVersion::RequestResponseHeader) | None => fallback,
            Some(version) => version,
        };
        // The downgrade must not move below what is already held.
        let accepted = accepted.max(*current);
        *current = accepted;
        accepted
    }
}
