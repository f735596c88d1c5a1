//! Unified logging initialisation
//!
//! Every binary and test harness in the workspace goes through
//! [`init_logging`] so the filter, format and environment override behave the
//! same everywhere:
//!
//! - `BINDERY_LOG` (an `EnvFilter` directive) wins over the configured level
//! - `text` or `json` output on stderr
//! - calling it twice is harmless

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive
pub const LOG_ENV_VAR: &str = "BINDERY_LOG";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level: {0}. Use trace, debug, info, warn, or error")]
    InvalidLevel(String),
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`)
    pub level: String,
    /// Line format
    pub format: LogFormat,
    /// Include the event target (module path)
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            with_target: true,
        }
    }
}

/// Parse a log level string
pub fn parse_log_level(level: &str) -> Result<Level, LoggingError> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}

/// Install the global `tracing` subscriber.
///
/// Returns `Ok(())` without touching anything when a subscriber is already
/// installed (tests commonly race on this).
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let level = parse_log_level(&config.level)?;
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Text => builder.try_init().is_ok(),
    };

    if installed {
        info!("Logging initialized with level: {}", level);
    } else {
        debug!("Logging already initialized, keeping existing subscriber");
    }
    Ok(())
}
