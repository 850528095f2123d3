//! Configuration data structures for platecache.
//!
//! This module defines the schema for the core's tunables: cache sizing,
//! prefetch concurrency, chunking thresholds, batching windows, and the
//! calendar offset used when grouping meals by day.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The root configuration object for the core.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// TTL cache sizing and expiry.
    #[serde(default)]
    pub cache: CacheSettings,

    /// Prefetch concurrency and priority thresholds.
    #[serde(default)]
    pub prefetch: PrefetchSettings,

    /// Chunked processing thresholds.
    #[serde(default)]
    pub chunking: ChunkingSettings,

    /// Update batching windows.
    #[serde(default)]
    pub batching: BatchingSettings,

    /// Meal sorting and grouping.
    #[serde(default)]
    pub sorting: SortingSettings,

    /// Cache hydration across restarts.
    #[serde(default)]
    pub persistence: PersistenceSettings,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the TTL cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Time-to-live applied when a caller does not pass one.
    /// Default: `300` (5 minutes)
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Maximum number of entries before insertion triggers eviction.
    /// Default: `100`
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

/// Settings for the prefetch admission queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefetchSettings {
    /// Fetches allowed to execute simultaneously.
    /// Default: `3`
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Requests at or above this priority bypass the concurrency limit.
    /// Default: `5`
    #[serde(default = "default_urgent_priority")]
    pub urgent_priority: i32,

    /// Priority used when a caller does not pass one.
    /// Default: `1`
    #[serde(default = "default_priority")]
    pub default_priority: i32,

    /// Concurrency ceiling applied while the host reports low performance.
    /// Default: `1`
    #[serde(default = "default_low_performance_concurrency")]
    pub low_performance_concurrency: usize,
}

/// Settings for chunked processing of large collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    /// Items processed per scheduler turn.
    /// Default: `50`
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Collections longer than this are sorted chunk by chunk.
    /// Default: `100`
    #[serde(default = "default_sort_threshold")]
    pub sort_threshold: usize,

    /// Lists longer than this should be rendered virtualized.
    /// Default: `50`
    #[serde(default = "default_virtualize_threshold")]
    pub virtualize_threshold: usize,
}

/// Settings for the batch updater.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingSettings {
    /// Flush as soon as this many items are pending.
    /// Default: `10`
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Flush this long after the first unflushed item at the latest.
    /// Default: `100`
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

/// Settings for meal sorting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortingSettings {
    /// Offset from UTC, in minutes, used to decide calendar days.
    /// Default: `0`
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Settings for on-disk cache hydration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceSettings {
    /// Whether caches are saved and restored.
    /// Default: `false`
    #[serde(default)]
    pub enabled: bool,

    /// JSON file holding the persisted entries.
    /// Default: `~/.platecache/cache.json`
    #[serde(default = "default_persistence_path")]
    pub path: String,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`, `compact`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl CacheSettings {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

impl BatchingSettings {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

// Default trait implementations linking to custom logic

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl Default for PrefetchSettings {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            urgent_priority: default_urgent_priority(),
            default_priority: default_priority(),
            low_performance_concurrency: default_low_performance_concurrency(),
        }
    }
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            sort_threshold: default_sort_threshold(),
            virtualize_threshold: default_virtualize_threshold(),
        }
    }
}

impl Default for BatchingSettings {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

impl Default for SortingSettings {
    fn default() -> Self {
        Self { utc_offset_minutes: 0 }
    }
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_persistence_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Helper functions for serde defaults and shared constants
fn default_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_max_entries() -> usize {
    100
}

fn default_max_concurrent() -> usize {
    3
}

fn default_urgent_priority() -> i32 {
    5
}

fn default_priority() -> i32 {
    1
}

fn default_low_performance_concurrency() -> usize {
    1
}

fn default_chunk_size() -> usize {
    50
}

fn default_sort_threshold() -> usize {
    100
}

fn default_virtualize_threshold() -> usize {
    50
}

fn default_max_batch_size() -> usize {
    10
}

fn default_max_wait_ms() -> u64 {
    100
}

fn default_persistence_path() -> String {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".platecache")
        .join("cache.json")
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
