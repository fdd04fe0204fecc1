//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Install the Prometheus exporter
//! - Record per-API request outcomes and latency
//!
//! # Metrics
//! - `inlet_requests_total` (counter): requests by API and response code
//! - `inlet_request_duration_seconds` (histogram): end-to-end latency by API
//! - `inlet_render_failures_total` (counter): bodies that fell back to the raw record
//!
//! # Design Decisions
//! - Multi calls record one sample per API, labelled with that API's code
//! - Exporter failures are logged; the inlet keeps serving

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one API call outcome.
pub fn record_request(api: &str, code: u64, start: Instant) {
    let api = if api.is_empty() { "unknown" } else { api };
    counter!(
        "inlet_requests_total",
        "api" => api.to_string(),
        "code" => code.to_string()
    )
    .increment(1);
    histogram!("inlet_request_duration_seconds", "api" => api.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_render_failure(api: &str) {
    counter!("inlet_render_failures_total", "api" => api.to_string()).increment(1);
}
