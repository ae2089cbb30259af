//! Prometheus metrics for the gateway.
//!
//! - HTTP request metrics (count, latency)
//! - Orchestration outcomes (cache hit, submitted, rejected, failed)
//! - Downstream call latency and errors per service

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    pub const EMOJIFY_OUTCOMES_TOTAL: &str = "emojify_outcomes_total";

    pub const DOWNSTREAM_CALL_DURATION_SECONDS: &str = "downstream_call_duration_seconds";
    pub const DOWNSTREAM_ERRORS_TOTAL: &str = "downstream_errors_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Pull-based: /metrics is served by the gateway itself
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }
            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => normalize_path(path),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "path" => normalize_path(path)
    )
    .record(duration.as_secs_f64());
}

/// Record the terminal state of one orchestrated request.
pub fn record_outcome(outcome: &'static str) {
    counter!(names::EMOJIFY_OUTCOMES_TOTAL, "outcome" => outcome).increment(1);
}

/// Record a downstream round trip.
pub fn record_downstream_call(service: &'static str, operation: &'static str, duration: Duration) {
    histogram!(
        names::DOWNSTREAM_CALL_DURATION_SECONDS,
        "service" => service,
        "operation" => operation
    )
    .record(duration.as_secs_f64());
}

/// Record a failed downstream call.
pub fn record_downstream_error(service: &'static str) {
    counter!(names::DOWNSTREAM_ERRORS_TOTAL, "service" => service).increment(1);
}

/// Only the fixed routes are labelled; anything else collapses to "other"
/// so scanners cannot blow up label cardinality.
fn normalize_path(path: &str) -> String {
    match path {
        "/" | "/health" | "/cache" | "/metrics" => path.to_string(),
        _ => "other".to_string(),
    }
}
