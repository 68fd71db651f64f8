//! Prometheus Metrics Module
//!
//! Host-level request metrics in Prometheus format. The host observes
//! traffic from the outside; nothing here reaches into the mounted
//! application.
//!
//! # Metrics Categories
//!
//! - **Requests**: totals by service, method, and status; duration histogram
//! - **Timeouts**: requests terminated by the traffic policy
//! - **In-flight**: currently processing requests per service
//!
//! # Integration
//!
//! Metrics are rendered at `GET /metrics` on the admin sidecar port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Idempotent: later calls return the handle installed by the first.
///
/// # Panics
///
/// Panics if a different global recorder was already installed by other
/// means.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "serve_host_requests_total",
        "Total requests handled per service, method, and status"
    );
    describe_histogram!(
        "serve_host_request_duration_seconds",
        "Request processing time as observed by the host"
    );
    describe_counter!(
        "serve_host_request_timeouts_total",
        "Requests terminated by the traffic timeout"
    );
    describe_gauge!(
        "serve_host_inflight_requests",
        "Requests currently being processed per service"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a completed request.
pub fn record_request(service: &str, method: &str, status: u16, duration: Duration) {
    counter!(
        "serve_host_requests_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "serve_host_request_duration_seconds",
        "service" => service.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a request terminated by the traffic timeout.
pub fn record_request_timeout(service: &str) {
    counter!(
        "serve_host_request_timeouts_total",
        "service" => service.to_string()
    )
    .increment(1);
}

/// Track a request entering processing.
pub fn inflight_inc(service: &str) {
    gauge!(
        "serve_host_inflight_requests",
        "service" => service.to_string()
    )
    .increment(1.0);
}

/// Track a request leaving processing.
pub fn inflight_dec(service: &str) {
    gauge!(
        "serve_host_inflight_requests",
        "service" => service.to_string()
    )
    .decrement(1.0);
}
