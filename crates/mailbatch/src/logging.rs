//! Process-wide log output.
//!
//! Library code logs through both `log` and `tracing` macros. `log` records
//! are bridged into the tracing subscriber so everything ends up in one
//! stream, filtered by `RUST_LOG` when set and the configured level otherwise.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::error::LoggingError;

/// Parses a configured level such as `info` or `DEBUG`.
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    level
        .trim()
        .parse::<LevelFilter>()
        .map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}

fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()))
}

/// Installs the global subscriber. Call once, early in `main`.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let level = parse_level(&config.level)?;

    tracing_log::LogTracer::init().map_err(|e| LoggingError::LogBridge(e.to_string()))?;

    let format: Box<dyn Layer<Registry> + Send + Sync> = if config.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let subscriber = tracing_subscriber::registry()
        .with(format)
        .with(env_filter(level));

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))
}
