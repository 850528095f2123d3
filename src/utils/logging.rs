//! Structured logging and key redaction utilities.
//!
//! This module configures the `tracing` ecosystem for the application and
//! provides a helper that keeps raw cache keys, which often embed user or
//! meal identifiers, out of log output.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::cache::CacheKey;
use crate::config::LoggingConfig;
use crate::error::{CoreError, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global tracing subscriber for the application.
///
/// Supports three output formats:
/// - `json`: Structured JSON logs for production ingestion.
/// - `compact`: Single-line output.
/// - `pretty` (default): Human-readable, colorized output for development.
///
/// Log levels are controlled via the `RUST_LOG` environment variable or
/// the provided `LoggingConfig`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    // Configure filter from environment or config file
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format.as_str() {
        "json" => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        "compact" => registry.with(tracing_subscriber::fmt::layer().compact()).try_init(),
        _ => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
    };

    result.map_err(|e| CoreError::Internal(format!("Failed to install tracing subscriber: {}", e)))
}

/// Returns a short, stable stand-in for a cache key.
///
/// The first 12 hex characters of the key's SHA256 digest are enough to
/// correlate log lines for the same key without revealing its segments.
pub fn redact_key(key: &CacheKey) -> String {
    let digest = key.digest();
    format!("key:{}", &digest[..12])
}
