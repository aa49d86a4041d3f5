//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber (JSON or pretty)
//! - Define the flat per-call record and emit it exactly once
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - Records go to the `api_request_log` target so sinks can route them
//! - Successful calls log at INFO, failures at ERROR

use std::fmt;

use chrono::{DateTime, Local, SecondsFormat};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Target of every per-call record.
pub const API_REQUEST_LOG_TARGET: &str = "api_request_log";

/// Value of the `source` field on per-call records.
pub const API_REQUEST_LOG_SOURCE: &str = "ApiRequestLog";

/// Placeholder for fields that do not apply to a record.
pub const NOT_APPLICABLE: &str = "na";

/// `protocol` value for RPC calls.
pub const PROTOCOL_GRPC: &str = "grpc";

/// `protocol` value for HTTP calls.
pub const PROTOCOL_REST: &str = "REST";

/// Side of the call a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Client,
    Server,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Client => "client",
            Component::Server => "server",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RFC 3339 with the local offset, e.g. `2024-05-01T10:00:00+02:00`.
pub fn format_start_time(start: &DateTime<Local>) -> String {
    start.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},rpc_interceptors={}", config.log_level, config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "Logging already initialized");
    }
}

/// Flat record emitted once per completed call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiRequestRecord {
    pub request_id: String,
    pub service: String,
    pub method: String,
    pub method_type: String,
    pub component: String,
    pub protocol: String,
    pub peer_address: String,
    pub start_time: String,
    pub time_ms: f64,
    pub code: String,
    pub error: Option<String>,
    pub url: Option<String>,
    /// Bounded replacement for `method` in metric labels, when `method`
    /// may carry a raw URL.
    #[serde(skip)]
    pub metric_method: Option<String>,
}

impl ApiRequestRecord {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Write the record to the log sink and update call metrics.
    pub fn emit(&self) {
        macro_rules! emit_record {
            ($level:expr) => {
                tracing::event!(
                    target: API_REQUEST_LOG_TARGET,
                    $level,
                    source = API_REQUEST_LOG_SOURCE,
                    request_id = %self.request_id,
                    service = %self.service,
                    method = %self.method,
                    method_type = %self.method_type,
                    component = %self.component,
                    protocol = %self.protocol,
                    peer_address = %self.peer_address,
                    start_time = %self.start_time,
                    time_ms = self.time_ms,
                    code = %self.code,
                    error = %self.error.as_deref().unwrap_or(NOT_APPLICABLE),
                    url = %self.url.as_deref().unwrap_or(NOT_APPLICABLE),
                    "finished call"
                )
            };
        }

        if self.is_success() {
            emit_record!(tracing::Level::INFO);
        } else {
            emit_record!(tracing::Level::ERROR);
        }

        crate::observability::metrics::record_call(self);
    }
}
