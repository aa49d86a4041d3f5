//! Per-call state threaded through the interceptor chains.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use http::HeaderMap;
use tokio_util::sync::CancellationToken;

use crate::interceptor::ctx_log::LogContext;
use crate::metadata::CallMetadata;
use crate::observability::logging::{format_start_time, NOT_APPLICABLE, PROTOCOL_GRPC};
use crate::observability::{ApiRequestRecord, Component};
use crate::status::Code;

/// Streaming shape of an RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MethodKind {
    #[default]
    Unary,
    ClientStreaming,
    ServerStreaming,
    BidiStreaming,
}

impl MethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::Unary => "unary",
            MethodKind::ClientStreaming => "client_streaming",
            MethodKind::ServerStreaming => "server_streaming",
            MethodKind::BidiStreaming => "bidi_streaming",
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything recorded about one call, from entry to completion.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub correlation_id: String,
    pub service: String,
    pub method: String,
    pub full_method: String,
    pub method_kind: MethodKind,
    pub component: Component,
    pub protocol: String,
    pub peer_address: String,
    pub start_time: DateTime<Local>,
    pub log_context: Option<LogContext>,
    started: Instant,
}

impl CallContext {
    /// Start a context for `full_method` (`/package.Service/Method`).
    pub fn new(component: Component, full_method: impl Into<String>, method_kind: MethodKind) -> Self {
        let full_method = full_method.into();
        let (service, method) = split_full_method(&full_method);
        Self {
            correlation_id: String::new(),
            service,
            method,
            full_method,
            method_kind,
            component,
            protocol: PROTOCOL_GRPC.to_string(),
            peer_address: NOT_APPLICABLE.to_string(),
            start_time: Local::now(),
            log_context: None,
            started: Instant::now(),
        }
    }

    /// Record the peer, dropping the `ipv4:`/`ipv6:` transport prefix.
    pub fn with_peer(mut self, peer: &str) -> Self {
        self.peer_address = parse_peer_address(peer).to_string();
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Complete the call. Consuming the context makes a second record
    /// impossible.
    pub fn finish(self, code: Code, error: Option<String>) -> ApiRequestRecord {
        let elapsed = self.elapsed();
        self.finish_with_elapsed(code, error, elapsed)
    }

    /// Complete the call with a duration measured elsewhere.
    pub fn finish_with_elapsed(self, code: Code, error: Option<String>, elapsed: Duration) -> ApiRequestRecord {
        ApiRequestRecord {
            request_id: self.correlation_id,
            service: self.service,
            method: self.method,
            method_type: self.method_kind.to_string(),
            component: self.component.to_string(),
            protocol: self.protocol,
            peer_address: self.peer_address,
            start_time: format_start_time(&self.start_time),
            time_ms: elapsed.as_secs_f64() * 1000.0,
            code: code.to_string(),
            error,
            url: None,
            metric_method: None,
        }
    }
}

/// A call arriving at a server chain.
#[derive(Debug, Clone)]
pub struct ServerCall<M> {
    pub context: CallContext,
    pub metadata: CallMetadata,
    pub message: M,
}

impl<M> ServerCall<M> {
    pub fn new(full_method: impl Into<String>, method_kind: MethodKind, metadata: CallMetadata, message: M) -> Self {
        Self {
            context: CallContext::new(Component::Server, full_method, method_kind),
            metadata,
            message,
        }
    }

    pub fn with_peer(mut self, peer: &str) -> Self {
        self.context = self.context.with_peer(peer);
        self
    }

    /// Log context for this call: the threaded copy if a stage set one,
    /// otherwise whatever the side channel carries.
    pub fn log_context(&self) -> Option<LogContext> {
        self.context
            .log_context
            .clone()
            .or_else(|| LogContext::from_metadata(&self.metadata))
    }

    /// Headers to attach to client calls made while serving this one.
    pub fn forwardable(&self) -> HeaderMap {
        self.metadata.forwardable()
    }
}

/// A call leaving through a client chain.
#[derive(Debug, Clone)]
pub struct ClientCall<M> {
    pub full_method: String,
    pub method_kind: MethodKind,
    /// Request metadata sent with the call.
    pub headers: HeaderMap,
    /// Metadata of the server call being handled, merged into `headers`.
    pub forwarded: HeaderMap,
    pub message: M,
    pub cancel: CancellationToken,
    pub peer_address: Option<String>,
}

impl<M> ClientCall<M> {
    pub fn new(full_method: impl Into<String>, method_kind: MethodKind, message: M) -> Self {
        Self {
            full_method: full_method.into(),
            method_kind,
            headers: HeaderMap::new(),
            forwarded: HeaderMap::new(),
            message,
            cancel: CancellationToken::new(),
            peer_address: None,
        }
    }

    pub fn unary(full_method: impl Into<String>, message: M) -> Self {
        Self::new(full_method, MethodKind::Unary, message)
    }

    pub fn with_forwarded(mut self, forwarded: HeaderMap) -> Self {
        self.forwarded = forwarded;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer_address = Some(peer.into());
        self
    }

    /// Context for a client-side record of this call.
    pub fn context(&self) -> CallContext {
        let mut context = CallContext::new(Component::Client, self.full_method.clone(), self.method_kind);
        context.correlation_id = crate::correlation::lookup_headers(&self.headers);
        match &self.peer_address {
            Some(peer) => context.with_peer(peer),
            None => context,
        }
    }
}

/// Split `/package.Service/Method` into (`Service`, `Method`).
///
/// Anything else yields an empty service and the input as the method.
pub fn split_full_method(full_method: &str) -> (String, String) {
    let mut parts = full_method.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(""), Some(service), Some(method), None) if !service.is_empty() && !method.is_empty() => {
            let service = service.rsplit('.').next().unwrap_or(service);
            (service.to_string(), method.to_string())
        }
        _ => {
            tracing::debug!(full_method, "Unexpected method name format");
            (String::new(), full_method.to_string())
        }
    }
}

fn parse_peer_address(peer: &str) -> &str {
    peer.strip_prefix("ipv4:")
        .or_else(|| peer.strip_prefix("ipv6:"))
        .unwrap_or(peer)
}
