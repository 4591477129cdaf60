//! Tracing subscriber setup for hosts embedding the engine
//!
//! The level and output format come from [`EngineConfig`]. A `RUST_LOG`
//! environment filter, when set, overrides the configured level.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{EngineConfig, LogFormat};
use crate::errors::{JingleError, Result};

/// Filter directives for the configured level
///
/// Engine events are logged at `log_level`; everything else stays at warn.
pub fn filter_directives(config: &EngineConfig) -> Result<String> {
    let level = parse_log_level(&config.log_level)?;
    Ok(format!(
        "warn,{}={}",
        env!("CARGO_CRATE_NAME"),
        level.as_str().to_ascii_lowercase()
    ))
}

/// Install the global subscriber
///
/// Fails with a configuration error if one is already installed.
pub fn init_logging(config: &EngineConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(config)?)
            .map_err(|e| JingleError::config(format!("invalid log filter: {}", e)))?,
    };

    let builder = fmt::Subscriber::builder().with_env_filter(filter);
    let installed = match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| JingleError::config(format!("failed to install subscriber: {}", e)))?;

    tracing::info!(
        "Logging initialized at {} ({:?})",
        config.log_level,
        config.log_format
    );
    Ok(())
}

/// Parse a log level, ignoring case
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| JingleError::config(format!("Invalid log level: {}", level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels_parse_case_insensitively() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn directives_scope_the_level_to_the_engine() {
        let mut config = EngineConfig::default();
        config.log_level = "TRACE".into();
        assert_eq!(filter_directives(&config).unwrap(), "warn,jingle_core=trace");

        config.log_level = "chatty".into();
        assert!(filter_directives(&config).is_err());
    }

    #[test]
    fn subscriber_installs_once() {
        let mut config = EngineConfig::default();
        config.log_level = "debug".into();
        config.log_format = LogFormat::Json;

        // nothing else in this test binary installs a global subscriber
        init_logging(&config).unwrap();
        tracing::debug!("engine logging is live");

        let err = init_logging(&config).unwrap_err();
        assert!(matches!(err, JingleError::Config { .. }));
    }
}
