//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dialdesk_requests_total` (counter): requests by method, status class
//! - `dialdesk_request_duration_seconds` (histogram): end-to-end latency per attempt
//! - `dialdesk_retries_total` (counter): retry sleeps by attempt number
//! - `dialdesk_circuit_transitions_total` (counter): breaker transitions by target state
//! - `dialdesk_cache_lookups_total` (counter): cache hits, misses and joined fetches

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Record one completed HTTP attempt. `status` is 0 for transport failures.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let class = status_class(status);
    ::metrics::counter!(
        "dialdesk_requests_total",
        "method" => method.to_string(),
        "status" => class
    )
    .increment(1);
    ::metrics::histogram!(
        "dialdesk_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(attempt: u32) {
    ::metrics::counter!("dialdesk_retries_total", "attempt" => attempt.to_string()).increment(1);
}

pub fn record_circuit_transition(circuit: &str, state: &'static str) {
    ::metrics::counter!(
        "dialdesk_circuit_transitions_total",
        "circuit" => circuit.to_string(),
        "state" => state
    )
    .increment(1);
}

pub fn record_cache_lookup(outcome: &'static str) {
    ::metrics::counter!("dialdesk_cache_lookups_total", "outcome" => outcome).increment(1);
}

fn status_class(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "error",
    }
}
