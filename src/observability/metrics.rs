//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): relayed HTTP requests by method, status
//! - `proxy_request_duration_seconds` (histogram): relay latency
//! - `proxy_rewrites_total` (counter): response bodies rewritten, by rule
//! - `proxy_upstream_connect_retries_total` (counter): connect retries taken
//! - `proxy_websocket_sessions_total` (counter): WebSocket sessions opened
//! - `proxy_websocket_sessions_active` (gauge): WebSocket sessions in flight
//! - `proxy_gate_decisions_total` (counter): login gate outcomes
//!
//! # Design Decisions
//! - The Prometheus exporter is opt-in; without it every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(address: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()?;
    tracing::info!(address = %address, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, started: Instant) {
    ::metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds")
        .record(started.elapsed().as_secs_f64());
}

pub fn record_rewrite(rule: &str) {
    ::metrics::counter!("proxy_rewrites_total", "rule" => rule.to_string()).increment(1);
}

pub fn record_connect_retry() {
    ::metrics::counter!("proxy_upstream_connect_retries_total").increment(1);
}

pub fn record_websocket_opened() {
    ::metrics::counter!("proxy_websocket_sessions_total").increment(1);
    ::metrics::gauge!("proxy_websocket_sessions_active").increment(1.0);
}

pub fn record_websocket_closed() {
    ::metrics::gauge!("proxy_websocket_sessions_active").decrement(1.0);
}

/// `outcome` is one of `cached`, `login_page`, `login_success`, `login_rejected`.
pub fn record_gate(outcome: &'static str) {
    ::metrics::counter!("proxy_gate_decisions_total", "outcome" => outcome).increment(1);
}
