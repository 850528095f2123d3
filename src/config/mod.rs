// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;

pub use models::*;

use crate::error::{CoreError, Result};
use config::{Config, Environment, File};
use std::path::PathBuf;

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Config file
    /// 3. Defaults (lowest)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path())
    }

    /// Same as [`AppConfig::load`] but reading an explicit config file path.
    /// A missing file is not an error.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Config::builder()
            // Start with defaults
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name(path).required(false))
            // Override with environment variables (e.g. PLATECACHE_CACHE__MAX_ENTRIES)
            .add_source(
                Environment::with_prefix("PLATECACHE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| CoreError::Config(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject values that would make the core unusable.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_entries == 0 {
            return Err(CoreError::Config("cache.max_entries must be at least 1".into()));
        }
        if self.prefetch.max_concurrent == 0 || self.prefetch.low_performance_concurrency == 0 {
            return Err(CoreError::Config(
                "prefetch concurrency limits must be at least 1".into(),
            ));
        }
        if self.chunking.chunk_size == 0 {
            return Err(CoreError::Config("chunking.chunk_size must be at least 1".into()));
        }
        if self.batching.max_batch_size == 0 {
            return Err(CoreError::Config("batching.max_batch_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".platecache")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}
