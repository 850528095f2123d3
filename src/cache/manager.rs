// TTL cache - bounded key/value store with lazy expiry and score-based eviction
// Author: kelexine (https://github.com/kelexine)

use crate::cache::key::CacheKey;
use crate::cache::models::{CacheEntry, CacheOptions, CacheStats};
use crate::metrics;
use crate::utils::logging::redact_key;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

struct CacheState<T> {
    entries: HashMap<CacheKey, CacheEntry<T>>,
    next_seq: u64,
    stats: CacheStats,
}

impl<T> CacheState<T> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
            stats: CacheStats::default(),
        }
    }
}

/// Bounded cache with time-to-live expiry.
///
/// Expiry is checked lazily on access; nothing sweeps the map in the
/// background. When an insertion finds the cache full, the entries with the
/// lowest `hit_count / max(1, age_minutes)` score are evicted first, oldest
/// insertion first on ties.
///
/// All mutations happen under a short synchronous lock and never across an
/// `.await`, so an interleaved task can never observe a half-applied update.
/// Cloning is cheap and yields a handle to the same cache.
pub struct TtlCache<T> {
    name: Arc<str>,
    defaults: CacheOptions,
    state: Arc<Mutex<CacheState<T>>>,
}

impl<T> Clone for TtlCache<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            defaults: self.defaults,
            state: self.state.clone(),
        }
    }
}

impl<T: Clone> TtlCache<T> {
    /// Create a new cache. `name` labels its metrics and log lines.
    pub fn new(name: &str, defaults: CacheOptions) -> Self {
        Self {
            name: Arc::from(name),
            defaults,
            state: Arc::new(Mutex::new(CacheState::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options used by callers that don't pass their own.
    pub fn defaults(&self) -> CacheOptions {
        self.defaults
    }

    /// Return the cached value if present, or run `fetcher` and cache its result.
    ///
    /// When the fetcher fails and an expired entry is still held for `key`,
    /// the expired value is returned instead of the error. Otherwise the
    /// fetcher's error is returned unchanged.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: &CacheKey,
        fetcher: F,
        options: CacheOptions,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(value) = self.get(key, options.ttl) {
            return Ok(value);
        }

        match fetcher().await {
            Ok(value) => {
                self.insert(key.clone(), value.clone(), options.max_size);
                Ok(value)
            }
            Err(e) => match self.fallback(key) {
                Some(stale) => Ok(stale),
                None => Err(e),
            },
        }
    }

    /// Look up a fresh value, counting a hit or a miss.
    pub fn get(&self, key: &CacheKey, ttl: Duration) -> Option<T> {
        let now = Instant::now();
        let mut state = self.state.lock();

        let fresh = match state.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now, ttl) => {
                entry.hit_count += 1;
                Some(entry.data.clone())
            }
            _ => None,
        };

        if fresh.is_some() {
            state.stats.hits += 1;
            metrics::record_cache_op(&self.name, "hit");
            debug!("[{}] cache hit: {}", self.name, redact_key(key));
        } else {
            state.stats.misses += 1;
            metrics::record_cache_op(&self.name, "miss");
            debug!("[{}] cache miss: {}", self.name, redact_key(key));
        }
        fresh
    }

    /// Whether a fresh entry exists, without touching statistics or hit counts.
    pub fn contains_fresh(&self, key: &CacheKey, ttl: Duration) -> bool {
        let now = Instant::now();
        self.state
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now, ttl))
    }

    /// Return whatever is held for `key`, expired or not, for use after a
    /// failed refresh.
    pub fn fallback(&self, key: &CacheKey) -> Option<T> {
        let mut state = self.state.lock();
        let value = state.entries.get(key).map(|entry| entry.data.clone());
        if value.is_some() {
            state.stats.stale_hits += 1;
            metrics::record_cache_op(&self.name, "stale");
            warn!(
                "[{}] refresh failed, serving stale value for {}",
                self.name,
                redact_key(key)
            );
        }
        value
    }

    /// [`TtlCache::insert`] bounded by the cache's default size.
    pub fn set(&self, key: CacheKey, data: T) {
        self.insert(key, data, self.defaults.max_size);
    }

    /// Store a value with a fresh timestamp and zero hits, evicting first if
    /// the cache is full. Replacing an existing key never triggers eviction.
    pub fn insert(&self, key: CacheKey, data: T, max_size: usize) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.entries.remove(&key);

        let evicted = Self::make_room(&self.name, &mut state, max_size, now);
        if evicted > 0 {
            debug!("[{}] evicted {} entries", self.name, evicted);
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            key,
            CacheEntry {
                data,
                stored_at: now,
                hit_count: 0,
                carried_age: Duration::ZERO,
                seq,
            },
        );
        state.stats.entries = state.entries.len();
        metrics::record_cache_op(&self.name, "store");
        metrics::update_cache_entries(&self.name, state.entries.len());
    }

    /// Evict the lowest-scoring entries until one more entry fits under
    /// `max_size`. Returns the number of entries removed.
    fn make_room(name: &str, state: &mut CacheState<T>, max_size: usize, now: Instant) -> usize {
        let max_size = max_size.max(1);
        if state.entries.len() < max_size {
            return 0;
        }
        let excess = state.entries.len() + 1 - max_size;

        let mut candidates: Vec<(f64, u64, CacheKey)> = state
            .entries
            .iter()
            .map(|(key, entry)| (entry.eviction_score(now), entry.seq, key.clone()))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        for (_, _, key) in candidates.into_iter().take(excess) {
            state.entries.remove(&key);
        }
        state.stats.evictions += excess as u64;
        metrics::record_cache_evictions(name, excess);
        excess
    }

    /// Remove a single entry. Returns whether it existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut state = self.state.lock();
        let removed = state.entries.remove(key).is_some();
        state.stats.entries = state.entries.len();
        metrics::update_cache_entries(&self.name, state.entries.len());
        removed
    }

    /// Remove every entry whose key segments start with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &[&str]) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|key, _| !key.starts_with_segments(prefix));
        let removed = before - state.entries.len();
        state.stats.entries = state.entries.len();
        metrics::update_cache_entries(&self.name, state.entries.len());
        if removed > 0 {
            debug!("[{}] invalidated {} entries under {:?}", self.name, removed, prefix);
        }
        removed
    }

    /// Drop all entries and reset statistics in one step.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.stats = CacheStats::default();
        metrics::update_cache_entries(&self.name, 0);
        debug!("[{}] cache cleared", self.name);
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            ..state.stats.clone()
        }
    }

    /// Hit count of an entry, if present. Does not count as an access.
    pub fn hit_count(&self, key: &CacheKey) -> Option<u64> {
        self.state.lock().entries.get(key).map(|entry| entry.hit_count)
    }

    /// Copy out every entry as `(key, data, age, hit_count)`, oldest first.
    pub fn export(&self) -> Vec<(CacheKey, T, Duration, u64)> {
        let now = Instant::now();
        let state = self.state.lock();
        let mut by_seq: Vec<(&CacheKey, &CacheEntry<T>)> = state.entries.iter().collect();
        by_seq.sort_by_key(|(_, entry)| entry.seq);
        by_seq
            .into_iter()
            .map(|(key, entry)| (key.clone(), entry.data.clone(), entry.age(now), entry.hit_count))
            .collect()
    }

    /// Restore an entry that is already `age` old, evicting first if the
    /// cache is full.
    pub fn restore(&self, key: CacheKey, data: T, age: Duration, hit_count: u64, max_size: usize) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.entries.remove(&key);
        Self::make_room(&self.name, &mut state, max_size, now);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            key,
            CacheEntry {
                data,
                stored_at: now,
                hit_count,
                carried_age: age,
                seq,
            },
        );
        state.stats.entries = state.entries.len();
        metrics::update_cache_entries(&self.name, state.entries.len());
    }
}
