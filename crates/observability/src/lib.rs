//! Logging for trackwire binaries.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for trackwire's own targets.
    pub level: String,

    /// Full filter directive (e.g. "trackwire_rpc=trace,info"); replaces `level`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Use JSON format for log output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            filter: None,
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Raise the level by `-v` count: 1 is debug, 2 or more is trace.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        match verbosity {
            0 => {}
            1 => self.level = "debug".to_string(),
            _ => self.level = "trace".to_string(),
        }
        self
    }

    /// The filter directive used when `RUST_LOG` is not set.
    pub fn directive(&self) -> String {
        match &self.filter {
            Some(filter) => filter.clone(),
            None => {
                let level = self.level.to_lowercase();
                format!(
                    "info,trackwire={level},trackwire_net_codec={level},\
                     trackwire_net_tracker={level},trackwire_rpc={level}"
                )
            }
        }
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `config`.
pub fn init_logging(config: &LoggingConfig) -> eyre::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directive()))?;

    let stdout_layer = fmt::Layer::new()
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(!config.json);

    let stdout_layer = if config.json {
        stdout_layer.json().boxed()
    } else {
        stdout_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        let directive = LoggingConfig::default().directive();
        assert!(directive.starts_with("info,"));
        assert!(directive.contains("trackwire_net_tracker=info"));
    }

    #[test]
    fn test_verbosity() {
        let config = LoggingConfig::default().with_verbosity(1);
        assert_eq!(config.level, "debug");
        assert!(config.directive().contains("trackwire_rpc=debug"));
        assert_eq!(LoggingConfig::default().with_verbosity(3).level, "trace");
        assert_eq!(LoggingConfig::default().with_verbosity(0).level, "info");
    }

    #[test]
    fn test_filter_replaces_level() {
        let config: LoggingConfig = toml::from_str(
            r#"
            level = "warn"
            filter = "trackwire_rpc=trace"
            json = true
            "#,
        )
        .unwrap();
        assert!(config.json);
        assert_eq!(config.directive(), "trackwire_rpc=trace");
    }

    #[test]
    fn test_directive_parses() {
        assert!(EnvFilter::try_new(LoggingConfig::default().directive()).is_ok());
    }
}
