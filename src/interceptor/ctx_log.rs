//! Context propagation: redacted request fields carried alongside the call.
//!
//! # Responsibilities
//! - Build a `LogContext` from the redacted inbound message
//! - Thread it on `CallContext::log_context` and publish it under
//!   `ctxlog-data` for stages that only see metadata
//! - Run the rest of the chain inside a `ctx_log` span carrying its fields
//!
//! # Design Decisions
//! - The header value is JSON with non-ASCII escaped, so it is always a
//!   valid header value
//! - A missing or broken side channel only costs log fields, never the call

use std::fmt::Write as _;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::header::{HeaderName, HeaderValue, InvalidHeaderValue};
use serde::{Deserialize, Serialize};
use tower::{Layer, Service};
use tracing::{Instrument, Span};

use crate::interceptor::call::ServerCall;
use crate::metadata::{CallMetadata, CTX_LOG_METADATA_KEY};
use crate::redact::{Message, RedactedPayload, RedactionEngine};
use crate::status::Status;

/// Value of the `source` field on context-enriched events.
pub const CTX_LOG_SOURCE: &str = "CtxLog";

/// Failure to publish a `LogContext` as metadata.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to serialize log context: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("log context is not a valid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
}

/// Log enrichment fields for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogContext {
    pub method: String,
    pub request_id: String,
    pub request: RedactedPayload,
    pub source: String,
}

impl LogContext {
    pub fn new(method: impl Into<String>, request_id: impl Into<String>, request: RedactedPayload) -> Self {
        Self {
            method: method.into(),
            request_id: request_id.into(),
            request,
            source: CTX_LOG_SOURCE.to_string(),
        }
    }

    /// Serialize as a header-safe JSON string.
    pub fn to_header_value(&self) -> Result<HeaderValue, ContextError> {
        let json = serde_json::to_string(self)?;
        Ok(HeaderValue::from_str(&escape_non_ascii(&json))?)
    }

    /// Read the side channel from inbound metadata.
    pub fn from_metadata(metadata: &CallMetadata) -> Option<Self> {
        let Some(raw) = metadata.inbound.get(CTX_LOG_METADATA_KEY) else {
            tracing::debug!("No log context in metadata");
            return None;
        };
        let parsed = raw
            .to_str()
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str(s).map_err(|e| e.to_string()));
        match parsed {
            Ok(context) => Some(context),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed log context");
                None
            }
        }
    }

    /// Span carrying every field of this context.
    pub fn span(&self) -> Span {
        let request = serde_json::to_string(&self.request).unwrap_or_default();
        tracing::info_span!(
            "ctx_log",
            source = %self.source,
            method = %self.method,
            request_id = %self.request_id,
            request = %request,
        )
    }
}

/// JSON with every character outside printable ASCII written as `\uXXXX`.
///
/// Only valid for JSON text, where such characters can only occur inside
/// string literals.
fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for c in json.chars() {
        if c.is_ascii() && !c.is_ascii_control() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units).iter() {
                let _ = write!(out, "\\u{:04x}", unit);
            }
        }
    }
    out
}

/// Layer that redacts the inbound message into a `LogContext`.
#[derive(Debug, Clone)]
pub struct CtxLogLayer {
    engine: RedactionEngine,
}

impl CtxLogLayer {
    pub fn new(engine: RedactionEngine) -> Self {
        Self { engine }
    }
}

impl<S> Layer<S> for CtxLogLayer {
    type Service = CtxLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CtxLogService {
            inner,
            engine: self.engine.clone(),
        }
    }
}

/// Service produced by [`CtxLogLayer`].
#[derive(Debug, Clone)]
pub struct CtxLogService<S> {
    inner: S,
    engine: RedactionEngine,
}

impl<S, M> Service<ServerCall<M>> for CtxLogService<S>
where
    M: Message,
    S: Service<ServerCall<M>, Error = Status>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = Status;
    type Future = BoxFuture<'static, Result<S::Response, Status>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut call: ServerCall<M>) -> Self::Future {
        let request = self.engine.redact_message(&call.message);
        let request_id = crate::correlation::lookup(&call.metadata);
        let context = LogContext::new(call.context.full_method.clone(), request_id, request);

        match context.to_header_value() {
            Ok(value) => {
                call.metadata
                    .inbound
                    .insert(HeaderName::from_static(CTX_LOG_METADATA_KEY), value);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to attach log context"),
        }

        let span = context.span();
        let method = context.method.clone();
        span.in_scope(|| tracing::info!("API handler logger output"));
        call.context.log_context = Some(context);

        let future = self.inner.call(call);
        Box::pin(
            async move {
                let result = future.await;
                if let Err(status) = &result {
                    tracing::error!(error = %status, "Error thrown by {}", method);
                }
                result
            }
            .instrument(span),
        )
    }
}
