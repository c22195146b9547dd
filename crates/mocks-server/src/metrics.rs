//! Prometheus metrics for the mock server.
//!
//! Tracks served route variants, unmatched requests and applied delays.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use tracing::warn;

lazy_static! {
    /// Requests answered by a route variant
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "mocks_requests_total",
        "Total number of requests served by a route variant",
        &["route", "variant", "status"]
    )
    .unwrap();

    /// Requests no mounted route matched
    pub static ref UNMATCHED_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "mocks_unmatched_requests_total",
        "Total number of requests that did not match any route",
        &["method"]
    )
    .unwrap();

    /// Delay applied before responding
    pub static ref RESPONSE_DELAY_MS: HistogramVec = register_histogram_vec!(
        "mocks_response_delay_ms",
        "Histogram of response delays in milliseconds",
        &["route"],
        vec![0.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Helper to record a request served by a route variant
pub fn record_request(route: &str, variant: &str, status: u16) {
    REQUESTS_TOTAL
        .with_label_values(&[route, variant, &status.to_string()])
        .inc();
}

/// Helper to record a request without matching route
pub fn record_unmatched(method: &str) {
    UNMATCHED_REQUESTS_TOTAL.with_label_values(&[method]).inc();
}

/// Helper to record an applied delay
pub fn record_delay(route: &str, delay_ms: u64) {
    RESPONSE_DELAY_MS
        .with_label_values(&[route])
        .observe(delay_ms as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_are_exported() {
        record_request("metrics-test-route", "success", 200);
        record_unmatched("PATCH");
        record_delay("metrics-test-route", 120);

        let output = collect_metrics();
        assert!(output.contains("mocks_requests_total"));
        assert!(output.contains("route=\"metrics-test-route\""));
        assert!(output.contains("mocks_unmatched_requests_total"));
        assert!(output.contains("mocks_response_delay_ms_bucket"));
    }
}
