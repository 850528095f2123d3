//! Cache entry, option and statistics models.

// Author: kelexine (https://github.com/kelexine)

use crate::config::CacheSettings;
use std::time::Duration;
use tokio::time::Instant;

/// Options applied to a single cache lookup.
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    /// Age at which an entry is considered stale.
    pub ttl: Duration,
    /// Maximum number of entries kept after an insertion.
    pub max_size: usize,
}

impl Default for CacheOptions {
    /// Provides default values for cache lookups.
    ///
    /// - `ttl`: 5 minutes
    /// - `max_size`: 100
    fn default() -> Self {
        CacheSettings::default().into()
    }
}

impl From<CacheSettings> for CacheOptions {
    fn from(settings: CacheSettings) -> Self {
        Self::from(&settings)
    }
}

impl From<&CacheSettings> for CacheOptions {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            ttl: settings.default_ttl(),
            max_size: settings.max_entries,
        }
    }
}

impl CacheOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }
}

/// A cached value with the bookkeeping needed for expiry and eviction.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub stored_at: Instant,
    pub hit_count: u64,
    /// Age the entry already had when it was restored from storage.
    pub(crate) carried_age: Duration,
    /// Monotonic insertion sequence, used to break eviction ties.
    pub(crate) seq: u64,
}

impl<T> CacheEntry<T> {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at) + self.carried_age
    }

    /// An entry is expired once `now - stored_at >= ttl`.
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) >= ttl
    }

    /// Eviction score: hits per minute of age, with age floored at one minute.
    ///
    /// The floor means a brand-new unused entry and a brand-new hot entry
    /// with the same hit count score alike during their first minute.
    pub fn eviction_score(&self, now: Instant) -> f64 {
        let age_minutes = self.age(now).as_secs_f64() / 60.0;
        self.hit_count as f64 / age_minutes.max(1.0)
    }
}

/// Statistics for cache operations.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    /// Lookups served from a fresh entry.
    pub hits: u64,
    /// Lookups that had to invoke the fetcher.
    pub misses: u64,
    /// Failed fetches answered with an expired entry.
    pub stale_hits: u64,
    /// Entries removed to stay within capacity.
    pub evictions: u64,
    /// Current number of entries.
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from cache, `0.0` when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
