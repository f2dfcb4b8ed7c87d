//! Prometheus metrics for the search engine and dispatcher.
//!
//! This module provides metrics for:
//! - Search calls (outcome, duration, result counts)
//! - Individual indexer queries (status, latency)
//! - Grabs handed to download clients

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Search Calls
// =============================================================================

/// Search calls by terminal phase.
pub static SEARCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("scout_searches_total", "Total search calls"),
        &["result"], // "selected", "empty", "cancelled", "invalid"
    )
    .unwrap()
});

/// Search call duration in seconds.
pub static SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("scout_search_duration_seconds", "Duration of search calls")
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 45.0, 60.0]),
        &["result"],
    )
    .unwrap()
});

/// Deduplicated releases per search.
pub static SEARCH_RESULTS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "scout_search_results",
            "Number of deduplicated releases per search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]),
    )
    .unwrap()
});

/// Searches cut short by the call deadline.
pub static SEARCH_DEADLINES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "scout_search_deadline_exceeded_total",
        "Search calls whose deadline elapsed before all indexers answered",
    )
    .unwrap()
});

// =============================================================================
// Indexer Queries
// =============================================================================

/// Indexer queries by indexer and status.
pub static INDEXER_QUERIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("scout_indexer_queries_total", "Total indexer queries"),
        &["indexer", "status"], // status: "ok", "timeout", "deadline", "unauthorized", ...
    )
    .unwrap()
});

/// Indexer query latency in seconds.
pub static INDEXER_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "scout_indexer_query_duration_seconds",
            "Duration of individual indexer queries",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0]),
        &["indexer"],
    )
    .unwrap()
});

// =============================================================================
// Dispatch
// =============================================================================

/// Grabs by download client and result.
pub static GRABS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("scout_grabs_total", "Releases handed to download clients"),
        &["client", "result"], // "success", "failure"
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search calls
        Box::new(SEARCHES_TOTAL.clone()),
        Box::new(SEARCH_DURATION.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        Box::new(SEARCH_DEADLINES.clone()),
        // Indexer queries
        Box::new(INDEXER_QUERIES.clone()),
        Box::new(INDEXER_QUERY_DURATION.clone()),
        // Dispatch
        Box::new(GRABS_TOTAL.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        SEARCHES_TOTAL.with_label_values(&["selected"]).inc();
        assert!(!registry.gather().is_empty());
    }
}
