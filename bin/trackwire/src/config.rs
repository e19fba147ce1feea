//! File configuration, overridden by command line flags.

use std::path::Path;

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use trackwire_net_tracker::TrackerConfig;
use trackwire_observability::LoggingConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) logging: LoggingConfig,
    pub(crate) tracker: TrackerConfig,
}

impl AppConfig {
    /// Load `path`, or the defaults when no file is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&raw)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))
    }
}
