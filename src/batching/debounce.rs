// Keyed debouncing
// Author: kelexine (https://github.com/kelexine)

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

type Timers = Arc<Mutex<HashMap<String, (u64, JoinHandle<()>)>>>;

/// Registry of debounce timers keyed by name.
///
/// Every wrapper returned by [`Debouncer::debounce`] with the same key
/// shares one timer: a call cancels whatever is scheduled under that key and
/// schedules itself `delay` later. Only the last call in a quiet window runs.
#[derive(Clone, Default)]
pub struct Debouncer {
    timers: Timers,
    next_generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `f` so that calls are debounced under `key`.
    ///
    /// The wrapper must be called from within a Tokio runtime.
    pub fn debounce<A, F>(
        &self,
        key: impl Into<String>,
        f: F,
        delay: Duration,
    ) -> impl Fn(A) + Clone + Send + Sync + 'static
    where
        A: Send + 'static,
        F: Fn(A) + Send + Sync + 'static,
    {
        let key: Arc<str> = Arc::from(key.into());
        let f = Arc::new(f);
        let timers = self.timers.clone();
        let next_generation = self.next_generation.clone();

        move |args: A| {
            let generation = next_generation.fetch_add(1, Ordering::Relaxed);
            let task_timers = timers.clone();
            let task_key = key.clone();
            let f = f.clone();

            // Hold the lock across spawn + insert so the timer can't fire and
            // look for its entry before it is registered
            let mut registered = timers.lock();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                {
                    let mut timers = task_timers.lock();
                    if timers.get(&*task_key).is_some_and(|(g, _)| *g == generation) {
                        timers.remove(&*task_key);
                    }
                }
                f(args);
            });

            if let Some((_, previous)) = registered.insert(key.to_string(), (generation, handle)) {
                trace!("Debounce '{}' rescheduled", key);
                previous.abort();
            }
        }
    }

    /// Cancel the scheduled call under `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &str) -> bool {
        match self.timers.lock().remove(key) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every scheduled call.
    pub fn cancel_all(&self) {
        for (_, (_, handle)) in self.timers.lock().drain() {
            handle.abort();
        }
    }

    /// Number of keys with a call scheduled.
    pub fn pending(&self) -> usize {
        self.timers.lock().len()
    }
}
