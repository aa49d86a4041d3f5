//! Metrics collection and exposition.
//!
//! # Metrics
//! - `api_requests_total` (counter): completed calls by component, protocol, method, code
//! - `api_request_duration_seconds` (histogram): call latency, same labels
//!
//! # Design Decisions
//! - HTTP calls are labelled by classified operation, never by raw URL;
//!   unclassified requests share one label per verb
//! - Without an installed recorder the macros are no-ops

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::observability::logging::ApiRequestRecord;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count and time a completed call.
pub fn record_call(record: &ApiRequestRecord) {
    let labels = call_labels(record);
    metrics::counter!("api_requests_total", &labels).increment(1);
    metrics::histogram!("api_request_duration_seconds", &labels).record(record.time_ms / 1000.0);
}

fn call_labels(record: &ApiRequestRecord) -> [(&'static str, String); 4] {
    let method = record.metric_method.as_ref().unwrap_or(&record.method);
    [
        ("component", record.component.clone()),
        ("protocol", record.protocol.clone()),
        ("method", method.clone()),
        ("code", record.code.clone()),
    ]
}
