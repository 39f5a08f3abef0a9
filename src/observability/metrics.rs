//! Metrics collection and exposition.
//!
//! # Metrics
//! - `api_requests_total` (counter): requests by method, status
//! - `api_request_duration_seconds` (histogram): latency distribution
//! - `api_rate_limited_total` (counter): requests refused by the limiter
//! - `api_auth_failures_total` (counter): rejected credentials by reason
//! - `api_panics_recovered_total` (counter): handler panics turned into 500s

use std::net::SocketAddr;
use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("api_requests_total", &labels).increment(1);
    metrics::histogram!("api_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    metrics::counter!("api_rate_limited_total").increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    metrics::counter!("api_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_panic_recovered() {
    metrics::counter!("api_panics_recovered_total").increment(1);
}

/// Outer middleware recording every response, including ones produced
/// by the pipeline stages themselves.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let response = next.run(request).await;
    record_request(method.as_str(), response.status().as_u16(), start);
    response
}
