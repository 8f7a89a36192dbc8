//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): requests by outcome (`ok`, `unavailable`, `rejected`)
//! - `lb_request_duration_seconds` (histogram): end-to-end latency
//! - `lb_retries_total` (counter): same-backend retries by backend
//! - `lb_failovers_total` (counter): backends given up on by the router
//! - `lb_backend_alive` (gauge): 1=alive, 0=dead, per backend
//!
//! Recording is a no-op until a recorder is installed by [`init_metrics`].

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str, start: Instant) {
    metrics::counter!("lb_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("lb_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_retry(backend: &str) {
    metrics::counter!("lb_retries_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_failover(backend: &str) {
    metrics::counter!("lb_failovers_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_backend_alive(backend: &str, alive: bool) {
    metrics::gauge!("lb_backend_alive", "backend" => backend.to_string())
        .set(if alive { 1.0 } else { 0.0 });
}
