//! Logging setup
//!
//! Warnings and errors go to stderr, everything else to stdout. `RUST_LOG`
//! takes precedence over `LOG_LEVEL`.

use std::io;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const LOG_FORMAT: &str = "LOG_FORMAT";

/// Logging configuration for the CLI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset (e.g. "info", "pgshift_core=debug")
    pub level: String,
    /// Emit one JSON object per event instead of plain text
    pub json_format: bool,
    /// Include the module path of each event
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_target: false,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let json_format = lookup(LOG_FORMAT)
            .map(|format| format.trim().eq_ignore_ascii_case("json"))
            .unwrap_or(defaults.json_format);

        Self {
            level: lookup(LOG_LEVEL)
                .filter(|level| !level.trim().is_empty())
                .unwrap_or(defaults.level),
            json_format,
            include_target: json_format,
        }
    }
}

/// Initialize logging for the process
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let writer = io::stderr.with_max_level(Level::WARN).or_else(io::stdout);

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(writer)
                    .with_target(config.include_target)
                    .json(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                Layer::new()
                    .with_writer(writer)
                    .with_target(config.include_target),
            )
            .try_init()?;
    }

    Ok(())
}
