//! Prometheus metrics for the HTTP server.
//!
//! This module provides:
//! - HTTP request metrics (latency, counts, in flight)
//! - Indexer registry gauges (collected on scrape)
//! - Registration of the core search and dispatch metrics

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "scout_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("scout_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "scout_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Registry Metrics
// =============================================================================

/// Registered indexers by state (collected dynamically).
pub static INDEXERS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("scout_indexers", "Registered indexers by state"),
        &["state"], // "enabled", "disabled"
    )
    .unwrap()
});

/// Indexers currently throttled by the local rate limiter.
pub static INDEXERS_THROTTLED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "scout_indexers_throttled",
        "Indexers with no rate limit token available",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Registry
    registry
        .register(Box::new(INDEXERS_BY_STATE.clone()))
        .unwrap();
    registry
        .register(Box::new(INDEXERS_THROTTLED.clone()))
        .unwrap();

    // Core metrics (searches, indexer queries, grabs)
    for metric in scout_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Refresh gauges from the current application state before a scrape.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    match state.store().list() {
        Ok(indexers) => {
            let enabled = indexers.iter().filter(|d| d.enabled).count() as i64;
            INDEXERS_BY_STATE
                .with_label_values(&["enabled"])
                .set(enabled);
            INDEXERS_BY_STATE
                .with_label_values(&["disabled"])
                .set(indexers.len() as i64 - enabled);
        }
        Err(e) => warn!(error = %e, "Failed to read indexers for metrics"),
    }

    let throttled = state
        .engine()
        .rate_limits()
        .all_status()
        .await
        .iter()
        .filter(|(_, status)| status.tokens_available < 1.0)
        .count();
    INDEXERS_THROTTLED.set(throttled as i64);
}

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});
static INDEXER_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/indexers/[^/]+").unwrap());
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_RE.replace_all(path, "{id}");
    let result = INDEXER_ID_RE.replace_all(&result, "/indexers/{id}");
    let result = NUMERIC_RE.replace_all(&result, "/{id}$1");
    result.to_string()
}
