// Metrics module for Prometheus observability
// Author: kelexine (https://github.com/kelexine)

mod registry;

pub use registry::{
    gather_metrics,
    REGISTRY,
    CACHE_OPERATIONS,
    CACHE_ENTRIES,
    PREFETCH_EVENTS,
    ADMISSION_STATE,
    SORT_DURATION,
    SORT_FALLBACKS,
    BATCH_FLUSHES,
};

/// Helper to record cache operations
pub fn record_cache_op(cache: &str, operation: &str) {
    CACHE_OPERATIONS.with_label_values(&[cache, operation]).inc();
}

pub fn record_cache_evictions(cache: &str, count: usize) {
    if count > 0 {
        CACHE_OPERATIONS
            .with_label_values(&[cache, "evict"])
            .inc_by(count as f64);
    }
}

pub fn update_cache_entries(cache: &str, count: usize) {
    CACHE_ENTRIES.with_label_values(&[cache]).set(count as f64);
}

/// Helper to record prefetch submissions
pub fn record_prefetch(event: &str) {
    PREFETCH_EVENTS.with_label_values(&[event]).inc();
}

pub fn update_admission(running: usize, queued: usize, ceiling: usize) {
    ADMISSION_STATE.with_label_values(&["running"]).set(running as f64);
    ADMISSION_STATE.with_label_values(&["queued"]).set(queued as f64);
    ADMISSION_STATE.with_label_values(&["ceiling"]).set(ceiling as f64);
}

/// Helper to record sorting metrics
pub fn record_sort(method: &str, chunked: bool, duration_secs: f64) {
    SORT_DURATION
        .with_label_values(&[method, &chunked.to_string()])
        .observe(duration_secs);
}

pub fn record_sort_fallback(method: &str) {
    SORT_FALLBACKS.with_label_values(&[method]).inc();
}

/// Helper to record batch flushes
pub fn record_batch_flush(reason: &str) {
    BATCH_FLUSHES.with_label_values(&[reason]).inc();
}
