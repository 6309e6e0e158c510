//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, method, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency by route
//! - `gateway_context_rejections_total` (counter): early 401/400s by route, reason
//! - `gateway_upstream_errors_total` (counter): transport failures by route

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::Method;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(route: &'static str, method: &Method, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "route" => route,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(route: &'static str, reason: &'static str) {
    metrics::counter!(
        "gateway_context_rejections_total",
        "route" => route,
        "reason" => reason
    )
    .increment(1);
}

pub fn record_upstream_error(route: &'static str) {
    metrics::counter!("gateway_upstream_errors_total", "route" => route).increment(1);
}
