//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, backend
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `proxy_retries_total` (counter): transport-level retries by backend
//! - `proxy_routing_misses_total` (counter): unmatched requests
//! - `proxy_server_up` (gauge): 1 while a server is up, 0 while down
//! - `proxy_table_generation` (gauge): routing tables published so far

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener. Failure is logged,
/// not fatal: the proxy serves traffic either way.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_counter!("proxy_requests_total", "Total proxied requests");
            describe_histogram!(
                "proxy_request_duration_seconds",
                "End-to-end request latency in seconds"
            );
            describe_counter!("proxy_retries_total", "Transport-level retry attempts");
            describe_counter!("proxy_routing_misses_total", "Requests no frontend matched");
            describe_gauge!("proxy_server_up", "Server health (1 up, 0 down)");
            describe_gauge!("proxy_table_generation", "Routing tables published");
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to start metrics exporter");
        }
    }
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string(),
    )
    .increment(1);
    histogram!(
        "proxy_request_duration_seconds",
        "backend" => backend.to_string(),
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(backend: &str) {
    counter!("proxy_retries_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_routing_miss(entry_point: &str) {
    counter!("proxy_routing_misses_total", "entry_point" => entry_point.to_string()).increment(1);
}

pub fn record_backend_health(server: &str, up: bool) {
    gauge!("proxy_server_up", "server" => server.to_string()).set(if up { 1.0 } else { 0.0 });
}

pub fn record_table_swap(generation: u64) {
    gauge!("proxy_table_generation").set(generation as f64);
}
