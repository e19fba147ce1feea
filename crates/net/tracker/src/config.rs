//! Tracker configuration.

use serde::{Deserialize, Serialize};

use crate::ProtocolVersion;

/// Identity and negotiation settings for one tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Name of the calling application; sent as `app_id` in the handshake.
    pub client: String,

    /// Name of the service on the other end, used in diagnostics.
    pub server: String,

    /// Version proposed by the client.
    ///
    /// `default` lets the server pick the highest tier it supports, which is
    /// also what implementations that predate explicit proposals expect.
    pub proposed_version: ProtocolVersion,
}

impl TrackerConfig {
    pub fn new(client: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            server: server.into(),
            ..Self::default()
        }
    }

    pub fn with_proposed_version(mut self, version: ProtocolVersion) -> Self {
        self.proposed_version = version;
        self
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            client: String::new(),
            server: String::new(),
            proposed_version: ProtocolVersion::Default,
        }
    }
}
