//! Metrics collection and exposition.
//!
//! # Metrics
//! - `catalog_http_requests_total` (counter): requests by method, route, status
//! - `catalog_http_request_duration_seconds` (histogram): latency distribution
//! - `catalog_http_requests_in_flight` (gauge): requests currently being served
//! - `catalog_shutdown_total` (counter): shutdown outcomes (clean, forced, listener_failed)
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished HTTP request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("catalog_http_requests_total", &labels).increment(1);
    metrics::histogram!("catalog_http_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_in_flight(count: u64) {
    metrics::gauge!("catalog_http_requests_in_flight").set(count as f64);
}

pub fn record_shutdown(outcome: &'static str) {
    metrics::counter!("catalog_shutdown_total", "outcome" => outcome).increment(1);
}
