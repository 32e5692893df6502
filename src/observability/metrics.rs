//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fanout_requests_total` (counter): inbound requests by method, status
//! - `fanout_request_duration_seconds` (histogram): inbound latency
//! - `fanout_outbound_attempts_total` (counter): attempts by call, result
//! - `fanout_call_outcomes_total` (counter): settled calls by call, outcome
//! - `fanout_call_duration_seconds` (histogram): settled call latency by call
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so the request path never blocks on it
//! - Prometheus exporter is optional and installed once at startup

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, duration: Duration) {
    counter!(
        "fanout_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("fanout_request_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_attempt(call: &str, result: &'static str) {
    counter!(
        "fanout_outbound_attempts_total",
        "call" => call.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_call_outcome(call: &str, outcome: &'static str, duration: Duration) {
    counter!(
        "fanout_call_outcomes_total",
        "call" => call.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("fanout_call_duration_seconds", "call" => call.to_string())
        .record(duration.as_secs_f64());
}
