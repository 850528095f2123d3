// Prefetch manager - request deduplication and prioritized fetching
// Author: kelexine (https://github.com/kelexine)

use crate::cache::{CacheKey, CacheOptions, TtlCache};
use crate::metrics;
use crate::prefetch::admission::AdmissionQueue;
use crate::prefetch::models::{PendingInfo, PrefetchOptions, PrefetchRequest};
use crate::utils::logging::redact_key;
use futures::future::{self, BoxFuture, Either, FutureExt, Ready, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

/// In-flight fetch shared by every caller that asked for the same key.
pub type SharedFetch<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// What [`PrefetchManager::prefetch`] hands back: either an immediately
/// available cached value or a handle to the in-flight fetch.
pub type PrefetchFuture<T, E> = Either<Ready<Result<T, E>>, SharedFetch<T, E>>;

struct PendingFetch<T, E> {
    id: u64,
    future: SharedFetch<T, E>,
    priority: i32,
    enqueued_at: Instant,
}

type PendingMap<T, E> = Arc<Mutex<HashMap<CacheKey, PendingFetch<T, E>>>>;

/// Removes the pending entry when the fetch task ends, including by panic.
struct PendingGuard<T, E> {
    pending: PendingMap<T, E>,
    key: CacheKey,
    id: u64,
}

impl<T, E> Drop for PendingGuard<T, E> {
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        if pending.get(&self.key).is_some_and(|p| p.id == self.id) {
            pending.remove(&self.key);
        }
    }
}

/// Deduplicating, priority-ordered fetcher on top of a [`TtlCache`].
///
/// A key has at most one fetch in flight. The lookup, the creation of the
/// fetch and its registration all happen synchronously inside
/// [`PrefetchManager::prefetch`], so two callers can never race to start
/// two fetches for the same key.
///
/// Fetches run on spawned tasks. A caller that drops its future only gives
/// up interest: the fetch still completes and still fills the cache.
///
/// An urgent request never waits behind a background fetch that has not
/// started yet, even one that was already granted a slot.
pub struct PrefetchManager<T, E> {
    cache: TtlCache<T>,
    admission: Arc<AdmissionQueue>,
    pending: PendingMap<T, E>,
    default_priority: i32,
    next_id: Arc<AtomicU64>,
}

impl<T, E> Clone for PrefetchManager<T, E> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            admission: self.admission.clone(),
            pending: self.pending.clone(),
            default_priority: self.default_priority,
            next_id: self.next_id.clone(),
        }
    }
}

impl<T, E> PrefetchManager<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(cache: TtlCache<T>, admission: Arc<AdmissionQueue>, default_priority: i32) -> Self {
        Self {
            cache,
            admission,
            pending: Arc::new(Mutex::new(HashMap::new())),
            default_priority,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn cache(&self) -> &TtlCache<T> {
        &self.cache
    }

    pub fn admission(&self) -> &Arc<AdmissionQueue> {
        &self.admission
    }

    /// Resolve `key` from cache, join an in-flight fetch, or start a new one.
    ///
    /// Must be called from within a Tokio runtime. If the fetch fails and an
    /// expired value is cached, the expired value is returned; otherwise the
    /// fetcher's error is returned unchanged to every waiting caller.
    ///
    /// # Panics
    ///
    /// A panic inside `fetcher` is re-raised in every caller awaiting the
    /// returned future.
    pub fn prefetch<F, Fut>(&self, key: CacheKey, fetcher: F, options: PrefetchOptions) -> PrefetchFuture<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let cache_options = self.cache_options(&options);
        let priority = options.priority.unwrap_or(self.default_priority);

        let mut pending = self.pending.lock();

        if !options.force {
            if let Some(value) = self.cache.get(&key, cache_options.ttl) {
                metrics::record_prefetch("cached");
                return Either::Left(future::ready(Ok(value)));
            }
        }

        if let Some(existing) = pending.get(&key) {
            metrics::record_prefetch("deduplicated");
            debug!(
                "Joining in-flight fetch for {} (priority {}, pending {:?})",
                redact_key(&key),
                existing.priority,
                existing.enqueued_at.elapsed()
            );
            return Either::Right(existing.future.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let urgent = self.admission.is_urgent(priority);
        let ticket = self.admission.request(priority);
        let guard = PendingGuard {
            pending: self.pending.clone(),
            key: key.clone(),
            id,
        };
        let cache = self.cache.clone();
        let task_key = key.clone();

        let task = tokio::spawn(async move {
            // Background fetches start one scheduler turn late, so an urgent
            // request submitted right behind them is invoked first
            if !urgent {
                tokio::task::yield_now().await;
            }
            let _permit = ticket.admitted().await;
            metrics::record_prefetch("started");
            debug!("Fetching {} (priority {})", redact_key(&task_key), priority);

            let result = match fetcher().await {
                Ok(value) => {
                    cache.insert(task_key.clone(), value.clone(), cache_options.max_size);
                    Ok(value)
                }
                Err(e) => match cache.fallback(&task_key) {
                    Some(stale) => Ok(stale),
                    None => {
                        metrics::record_prefetch("failed");
                        Err(e)
                    }
                },
            };

            // Cache is filled before the pending entry disappears, so a new
            // request in between sees the fresh value instead of refetching
            drop(guard);
            result
        });

        let shared = async move {
            match task.await {
                Ok(result) => result,
                Err(join_error) if join_error.is_panic() => {
                    std::panic::resume_unwind(join_error.into_panic())
                }
                Err(join_error) => panic!("prefetch task did not complete: {}", join_error),
            }
        }
        .boxed()
        .shared();

        pending.insert(
            key,
            PendingFetch {
                id,
                future: shared.clone(),
                priority,
                enqueued_at: Instant::now(),
            },
        );

        Either::Right(shared)
    }

    /// Submit several requests, highest priority first, and wait for all of
    /// them. One failure never affects the others. Results are returned in
    /// the order the requests were given.
    pub async fn prefetch_batch(&self, requests: Vec<PrefetchRequest<T, E>>) -> Vec<Result<T, E>> {
        let mut indexed: Vec<(usize, PrefetchRequest<T, E>)> = requests.into_iter().enumerate().collect();
        // Stable sort keeps input order among equal priorities
        indexed.sort_by(|a, b| {
            let pa = a.1.priority.unwrap_or(self.default_priority);
            let pb = b.1.priority.unwrap_or(self.default_priority);
            pb.cmp(&pa)
        });

        let mut submitted = Vec::with_capacity(indexed.len());
        for (index, request) in indexed {
            let options = PrefetchOptions {
                ttl: request.stale_time,
                priority: request.priority,
                force: false,
                max_size: None,
            };
            let fetcher = request.fetcher;
            submitted.push((index, self.prefetch(request.key, fetcher, options)));
        }

        let (order, futures): (Vec<usize>, Vec<_>) = submitted.into_iter().unzip();
        let settled = future::join_all(futures).await;

        let mut results: Vec<(usize, Result<T, E>)> = order.into_iter().zip(settled).collect();
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    /// Whether a fetch for `key` is currently in flight.
    pub fn is_pending(&self, key: &CacheKey) -> bool {
        self.pending.lock().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Snapshot of the in-flight fetches.
    pub fn pending(&self) -> Vec<PendingInfo> {
        self.pending
            .lock()
            .iter()
            .map(|(key, fetch)| PendingInfo {
                key: key.clone(),
                priority: fetch.priority,
                waiting_for: fetch.enqueued_at.elapsed(),
            })
            .collect()
    }

    fn cache_options(&self, options: &PrefetchOptions) -> CacheOptions {
        let defaults = self.cache.defaults();
        CacheOptions {
            ttl: options.ttl.unwrap_or(defaults.ttl),
            max_size: options.max_size.unwrap_or(defaults.max_size),
        }
    }
}
