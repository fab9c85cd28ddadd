//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): completed requests by reply status
//! - `proxy_blocked_total` (counter): requests refused by the filter
//! - `proxy_relayed_bytes_total` (counter): origin bytes copied to clients
//! - `proxy_request_duration_seconds` (histogram): time from accept to close
//! - `proxy_active_connections` (gauge): handlers currently running

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request. Status 200 stands for a relayed origin response.
pub fn record_request(status: u16, start: Instant) {
    metrics::counter!("proxy_requests_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_blocked() {
    metrics::counter!("proxy_blocked_total").increment(1);
}

pub fn record_relayed(bytes: u64) {
    metrics::counter!("proxy_relayed_bytes_total").increment(bytes);
}

pub fn connection_opened() {
    metrics::gauge!("proxy_active_connections").increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!("proxy_active_connections").decrement(1.0);
}
