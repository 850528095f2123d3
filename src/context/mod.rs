//! Process-wide core context.
//!
//! One [`CoreContext`] is built at startup and handed to every consumer. It
//! owns the configuration, the admission queue shared by all prefetch
//! managers, the meal sorting engine and the debounce timers. Caches and
//! prefetch managers are created per data type through it so they all pick
//! up the same settings and the same concurrency ceiling.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::batching::{BatchUpdater, Debouncer};
use crate::cache::{CacheOptions, JsonFileStore, TtlCache};
use crate::chunking::{self, ChunkedProcessor};
use crate::config::AppConfig;
use crate::meals::{Meal, MealSortingEngine, SortMethod, SortedSection};
use crate::prefetch::{AdmissionQueue, PrefetchManager};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub struct CoreContext {
    config: AppConfig,
    admission: Arc<AdmissionQueue>,
    sorting: MealSortingEngine,
    debouncer: Debouncer,
    low_performance: AtomicBool,
}

impl CoreContext {
    pub fn new(config: AppConfig) -> Self {
        let admission = AdmissionQueue::from_settings(&config.prefetch);
        let sorting = MealSortingEngine::from_settings(&config.chunking, &config.sorting);
        Self {
            config,
            admission,
            sorting,
            debouncer: Debouncer::new(),
            low_performance: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn admission(&self) -> &Arc<AdmissionQueue> {
        &self.admission
    }

    pub fn sorting(&self) -> &MealSortingEngine {
        &self.sorting
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    /// A new named cache with the configured TTL and size bound.
    pub fn cache<T: Clone>(&self, name: &str) -> TtlCache<T> {
        TtlCache::new(name, CacheOptions::from(&self.config.cache))
    }

    /// A prefetch manager over a new cache, sharing this context's
    /// admission queue.
    pub fn prefetcher<T, E>(&self, name: &str) -> PrefetchManager<T, E>
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        PrefetchManager::new(
            self.cache(name),
            self.admission.clone(),
            self.config.prefetch.default_priority,
        )
    }

    /// The on-disk cache store, when persistence is enabled.
    pub fn cache_store(&self) -> Option<JsonFileStore> {
        self.config
            .persistence
            .enabled
            .then(|| JsonFileStore::new(&self.config.persistence.path))
    }

    pub fn chunked_processor(&self) -> ChunkedProcessor {
        ChunkedProcessor::from(&self.config.chunking)
    }

    /// A batch updater with the configured size and wait bounds.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn batch_updater<T, S>(&self, sink: S) -> BatchUpdater<T>
    where
        T: Send + 'static,
        S: FnMut(Vec<T>) + Send + 'static,
    {
        BatchUpdater::from_settings(sink, &self.config.batching)
    }

    pub async fn sort_meals(&self, meals: &[Meal], method: SortMethod) -> Vec<SortedSection> {
        self.sorting.sort(meals, method).await
    }

    /// Whether a list of `item_count` rows should be rendered virtualized.
    pub fn should_virtualize(&self, item_count: usize) -> bool {
        chunking::should_virtualize(item_count, self.config.chunking.virtualize_threshold)
    }

    /// Lower the shared concurrency ceiling while the device is struggling,
    /// and restore the configured ceiling afterwards.
    pub fn set_low_performance(&self, enabled: bool) {
        if self.low_performance.swap(enabled, Ordering::SeqCst) == enabled {
            return;
        }

        let ceiling = if enabled {
            self.config.prefetch.low_performance_concurrency
        } else {
            self.config.prefetch.max_concurrent
        };
        info!(
            "Low-performance mode {}; prefetch concurrency is now {}",
            if enabled { "on" } else { "off" },
            ceiling
        );
        self.admission.set_max_concurrent(ceiling);
    }

    pub fn is_low_performance(&self) -> bool {
        self.low_performance.load(Ordering::SeqCst)
    }
}

impl Default for CoreContext {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefetch::PrefetchOptions;
    use crate::cache::CacheKey;

    #[test]
    fn test_low_performance_mode_toggles_ceiling() {
        let context = CoreContext::default();
        assert_eq!(context.admission().max_concurrent(), 3);

        context.set_low_performance(true);
        assert!(context.is_low_performance());
        assert_eq!(context.admission().max_concurrent(), 1);

        context.set_low_performance(false);
        assert_eq!(context.admission().max_concurrent(), 3);
    }

    #[test]
    fn test_should_virtualize_uses_threshold() {
        let context = CoreContext::default();
        assert!(!context.should_virtualize(50));
        assert!(context.should_virtualize(51));
    }

    #[test]
    fn test_persistence_disabled_by_default() {
        assert!(CoreContext::default().cache_store().is_none());
    }

    #[tokio::test]
    async fn test_prefetchers_share_admission_queue() {
        let context = CoreContext::default();
        let meals = context.prefetcher::<u32, String>("meals");
        let stats = context.prefetcher::<u32, String>("stats");
        assert!(Arc::ptr_eq(meals.admission(), stats.admission()));

        let value = meals
            .prefetch(
                CacheKey::from(["meals", "today"]),
                || async { Ok::<_, String>(3) },
                PrefetchOptions::default(),
            )
            .await;
        assert_eq!(value, Ok(3));
        assert_eq!(context.admission().running(), 0);
    }
}
