//! Metrics collection and exposition.
//!
//! # Metrics
//! - `admission_requests_total` (counter): requests by strategy and verdict
//! - `admission_backend_duration_seconds` (histogram): backend latency
//! - `circuit_breaker_state` (gauge): 0=closed, 1=tripped, 2=recovering
//! - `circuit_breaker_transitions_total` (counter): by from/to state
//! - `admission_queue_depth` (gauge): tickets waiting for a worker
//! - `admission_queue_in_flight` (gauge): admitted, not yet completed
//! - `admission_queue_rejected_total` (counter)
//! - `rate_limit_rejected_total` (counter)
//!
//! Every helper is a no-op until a recorder is installed, so components and
//! tests can call them freely.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_verdict(strategy: &'static str, verdict: &'static str) {
    counter!("admission_requests_total", "strategy" => strategy, "verdict" => verdict).increment(1);
}

pub fn record_backend_latency(latency: Duration) {
    histogram!("admission_backend_duration_seconds").record(latency.as_secs_f64());
}

pub fn record_circuit_transition(from: &'static str, to: &'static str, state_code: u8) {
    counter!("circuit_breaker_transitions_total", "from" => from, "to" => to).increment(1);
    gauge!("circuit_breaker_state").set(f64::from(state_code));
}

pub fn record_queue_depth(depth: usize, in_flight: usize) {
    gauge!("admission_queue_depth").set(depth as f64);
    gauge!("admission_queue_in_flight").set(in_flight as f64);
}

pub fn record_queue_rejected() {
    counter!("admission_queue_rejected_total").increment(1);
}

pub fn record_rate_limited() {
    counter!("rate_limit_rejected_total").increment(1);
}
