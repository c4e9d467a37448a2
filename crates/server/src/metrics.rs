//! Prometheus metrics for the HTTP surface.

use once_cell::sync::Lazy;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use regex_lite::Regex;

/// HTTP requests by method, normalized path, and status.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("convoy_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "convoy_http_request_duration_seconds",
            "HTTP request duration",
        )
        .buckets(vec![0.005, 0.025, 0.1, 0.25, 1.0, 5.0]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// Requests currently being served.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "convoy_http_requests_in_flight",
        "HTTP requests currently in flight",
    )
    .unwrap()
});

/// Rejected authentication attempts.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "convoy_auth_failures_total",
        "Total rejected authentication attempts",
    )
    .unwrap()
});

static ID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new("^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

/// Collapse ID path segments so metrics cardinality stays bounded.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if ID_SEGMENT.is_match(segment) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Register all server metrics with the given registry.
pub fn register(registry: &Registry) {
    let _ = registry.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = registry.register(Box::new(HTTP_REQUEST_DURATION.clone()));
    let _ = registry.register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()));
    let _ = registry.register(Box::new(AUTH_FAILURES_TOTAL.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_uuids() {
        let path = "/api/v1/batches/0d4cbc09-2ab3-4e1f-9c5a-94d3a7d2b111/status";
        assert_eq!(normalize_path(path), "/api/v1/batches/:id/status");
    }

    #[test]
    fn test_normalize_path_leaves_plain_paths() {
        assert_eq!(normalize_path("/api/v1/batches"), "/api/v1/batches");
        assert_eq!(normalize_path("/health"), "/health");
    }
}
