//! Persistent storage for cache hydration across restarts.
//!
//! Entries are stored with a wall-clock timestamp so their age survives the
//! restart: an entry saved five minutes before shutdown comes back five
//! minutes old (plus downtime), not fresh.

// Author: kelexine (https://github.com/kelexine)

use crate::cache::key::CacheKey;
use crate::cache::manager::TtlCache;
use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One cache entry as written to storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedEntry<T> {
    pub key: CacheKey,
    pub data: T,
    pub stored_at: DateTime<Utc>,
    pub hit_count: u64,
}

/// Key/value backend used to save and restore cache contents.
pub trait CacheStore<T>: Send + Sync {
    fn load(&self) -> Result<Vec<PersistedEntry<T>>>;
    fn save(&self, entries: &[PersistedEntry<T>]) -> Result<()>;
}

/// Stores all entries as one JSON array in a file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> CacheStore<T> for JsonFileStore
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Vec<PersistedEntry<T>>> {
        if !self.path.exists() {
            debug!("No persisted cache at {}", self.path.display());
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| {
            CoreError::Persistence(format!(
                "Invalid cache file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn save(&self, entries: &[PersistedEntry<T>]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write next to the target and rename so a crash never leaves a torn file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl<T: Clone> TtlCache<T> {
    /// Export all entries with wall-clock timestamps.
    pub fn snapshot(&self) -> Vec<PersistedEntry<T>> {
        let now = Utc::now();
        self.export()
            .into_iter()
            .map(|(key, data, age, hit_count)| PersistedEntry {
                key,
                data,
                stored_at: chrono::Duration::from_std(age)
                    .ok()
                    .and_then(|age| now.checked_sub_signed(age))
                    .unwrap_or(now),
                hit_count,
            })
            .collect()
    }

    /// Load entries from `store`, keeping each entry's age. Expired entries
    /// are restored too so they can still serve as stale fallbacks. Returns
    /// the number of entries read.
    pub fn hydrate(&self, store: &dyn CacheStore<T>) -> Result<usize> {
        let mut entries = store.load()?;
        entries.sort_by_key(|entry| entry.stored_at);

        let now = Utc::now();
        let max_size = self.defaults().max_size;
        let restored = entries.len();
        for entry in entries {
            let age = (now - entry.stored_at).to_std().unwrap_or_default();
            self.restore(entry.key, entry.data, age, entry.hit_count, max_size);
        }
        info!("[{}] hydrated {} cache entries", self.name(), restored);
        Ok(restored)
    }

    /// Write the current contents to `store`.
    pub fn persist(&self, store: &dyn CacheStore<T>) -> Result<usize> {
        let entries = self.snapshot();
        store.save(&entries)?;
        debug!("[{}] persisted {} cache entries", self.name(), entries.len());
        Ok(entries.len())
    }
}
