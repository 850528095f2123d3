// Prometheus metrics registry and collectors
// Author: kelexine (https://github.com/kelexine)

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, HistogramVec, GaugeVec, Opts, Registry, TextEncoder, Encoder,
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
    register_gauge_vec_with_registry,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // CACHE METRICS
    // ============================================================================

    /// Cache operations
    pub static ref CACHE_OPERATIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cache_operations_total", "Total cache operations"),
        &["cache", "operation"], // operation: hit, miss, stale, store, evict
        REGISTRY
    ).unwrap();

    /// Current cache entries
    pub static ref CACHE_ENTRIES: GaugeVec = register_gauge_vec_with_registry!(
        Opts::new("cache_entries_current", "Current number of cache entries"),
        &["cache"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // PREFETCH METRICS
    // ============================================================================

    /// Prefetch requests by outcome at submission time
    pub static ref PREFETCH_EVENTS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("prefetch_events_total", "Total prefetch requests by outcome"),
        &["event"], // event: cached, deduplicated, started, queued, urgent, failed
        REGISTRY
    ).unwrap();

    /// Admission queue state
    pub static ref ADMISSION_STATE: GaugeVec = register_gauge_vec_with_registry!(
        Opts::new("prefetch_admission_current", "Prefetch admission queue state"),
        &["state"], // state: running, queued, ceiling
        REGISTRY
    ).unwrap();

    // ============================================================================
    // SORTING METRICS
    // ============================================================================

    /// Meal sort duration
    pub static ref SORT_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        prometheus::HistogramOpts::new("meal_sort_duration_seconds", "Meal sort and grouping duration")
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["method", "chunked"],
        REGISTRY
    ).unwrap();

    /// Sorts that fell back to the default date grouping
    pub static ref SORT_FALLBACKS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("meal_sort_fallbacks_total", "Total sorts that fell back to date grouping"),
        &["method"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // BATCHING METRICS
    // ============================================================================

    /// Batch flushes
    pub static ref BATCH_FLUSHES: CounterVec = register_counter_vec_with_registry!(
        Opts::new("batch_flushes_total", "Total batch updater flushes"),
        &["reason"], // reason: size, timeout, manual, shutdown
        REGISTRY
    ).unwrap();
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
