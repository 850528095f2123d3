//! Prefetch request and option models.

// Author: kelexine (https://github.com/kelexine)

use crate::cache::CacheKey;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::time::Duration;

/// Per-request options for [`super::PrefetchManager::prefetch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefetchOptions {
    /// Freshness window; the cache default when `None`.
    pub ttl: Option<Duration>,
    /// Admission priority; the manager default when `None`.
    pub priority: Option<i32>,
    /// Fetch even when a fresh value is cached.
    pub force: bool,
    /// Cache capacity applied on insertion; the cache default when `None`.
    pub max_size: Option<usize>,
}

impl PrefetchOptions {
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Boxed fetcher accepted by batch submission.
pub type BoxedFetcher<T, E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, E>> + Send>;

/// One entry of a [`super::PrefetchManager::prefetch_batch`] call.
pub struct PrefetchRequest<T, E> {
    pub key: CacheKey,
    pub fetcher: BoxedFetcher<T, E>,
    /// Freshness window for this key.
    pub stale_time: Option<Duration>,
    pub priority: Option<i32>,
}

impl<T: 'static, E: 'static> PrefetchRequest<T, E> {
    pub fn new<F, Fut>(key: CacheKey, fetcher: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            key,
            fetcher: Box::new(move || fetcher().boxed()),
            stale_time: None,
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }
}

/// Read-only view of an in-flight fetch.
#[derive(Debug, Clone)]
pub struct PendingInfo {
    pub key: CacheKey,
    pub priority: i32,
    pub waiting_for: Duration,
}
