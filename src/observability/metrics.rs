//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gisproxy_requests_total` (counter): requests by method, status, server and service type
//! - `gisproxy_request_duration_seconds` (histogram): time until the response head was ready
//!
//! # Design Decisions
//! - Opt-in Prometheus endpoint; recording without an installed recorder is a no-op
//! - Labels come from the ServiceInfo classification

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{ProxyError, Result};
use crate::gis::ServiceInfo;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| ProxyError::Config(format!("metrics exporter: {e}")))?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one relayed request.
pub fn record_request(method: &str, status: u16, service: &ServiceInfo, start: Instant) {
    metrics::counter!(
        "gisproxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "server_type" => service.server_type.clone(),
        "service_type" => service.service_type.clone()
    )
    .increment(1);
    metrics::histogram!(
        "gisproxy_request_duration_seconds",
        "method" => method.to_string(),
        "server_type" => service.server_type.clone()
    )
    .record(start.elapsed().as_secs_f64());
}
