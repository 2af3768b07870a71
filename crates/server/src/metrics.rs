//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the finpipe server:
//! - HTTP request metrics (latency, counts, in-flight)
//! - Event delivery outcomes

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

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
            "finpipe_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.005, 0.025, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("finpipe_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "finpipe_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Event Metrics
// =============================================================================

/// Event deliveries by outcome.
pub static EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("finpipe_events_total", "Storage event deliveries by outcome"),
        &["outcome"],
    )
    .unwrap()
});

/// Outcome label for deliveries that failed on infrastructure.
pub const INFRA_ERROR: &str = "infra_error";

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

    // Events
    registry.register(Box::new(EVENTS_TOTAL.clone())).unwrap();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Normalize a path for metric labels.
///
/// Only known routes keep their path; anything else is folded into one label
/// so scanners cannot blow up label cardinality.
pub fn normalize_path(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/config" => "/config",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_known_routes() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("/config"), "/config");
    }

    #[test]
    fn test_normalize_path_unknown_routes() {
        assert_eq!(normalize_path("/wp-admin/setup.php"), "other");
        assert_eq!(normalize_path("/health/"), "other");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        // Access metrics to ensure they're initialized
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics().unwrap();
        assert!(output.contains("finpipe_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        // Prometheus only outputs metrics that have been accessed
        HTTP_REQUEST_DURATION
            .with_label_values(&["POST", "/", "204"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        EVENTS_TOTAL.with_label_values(&[INFRA_ERROR]).inc();

        let output = encode_metrics().unwrap();

        assert!(output.contains("finpipe_http_request_duration_seconds"));
        assert!(output.contains("finpipe_http_requests_in_flight"));
        assert!(output.contains("finpipe_events_total{outcome=\"infra_error\"}"));
    }
}
