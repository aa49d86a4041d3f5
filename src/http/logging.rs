//! Per-request logging for HTTP calls.
//!
//! # Responsibilities
//! - Label each request with its classified operation
//! - Resolve the correlation id (server) or read it (client)
//! - Emit one `ApiRequestRecord` per completed request
//!
//! # Design Decisions
//! - Works for any `tower::Service` over `http` types, so the same layer wraps
//!   an axum router or an outbound HTTP client
//! - Service errors are logged with code `na` and returned unchanged
//! - Non-2xx responses are failures; the error is the reason phrase

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::ConnectInfo;
use chrono::Local;
use futures_util::future::BoxFuture;
use http::{header, HeaderMap, Request, Response, StatusCode};
use tower::{Layer, Service};
use url::Url;

use crate::correlation;
use crate::http::classify::RequestClassifier;
use crate::http::trim::trim_target;
use crate::metadata::CallMetadata;
use crate::observability::logging::{format_start_time, NOT_APPLICABLE, PROTOCOL_REST};
use crate::observability::{ApiRequestRecord, Component};
use crate::status::Code;

const METHOD_TYPE: &str = "unary";

/// Tower layer that logs every HTTP request passing through it.
#[derive(Debug, Clone)]
pub struct HttpLogLayer {
    classifier: Arc<RequestClassifier>,
    component: Component,
}

impl HttpLogLayer {
    /// Layer for outbound requests. The correlation id is only read.
    pub fn client(classifier: Arc<RequestClassifier>) -> Self {
        Self {
            classifier,
            component: Component::Client,
        }
    }

    /// Layer for inbound requests. A missing correlation id is generated
    /// and returned in the response headers.
    pub fn server(classifier: Arc<RequestClassifier>) -> Self {
        Self {
            classifier,
            component: Component::Server,
        }
    }
}

impl<S> Layer<S> for HttpLogLayer {
    type Service = HttpLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        HttpLogService {
            inner,
            classifier: self.classifier.clone(),
            component: self.component,
        }
    }
}

/// Service produced by [`HttpLogLayer`].
#[derive(Debug, Clone)]
pub struct HttpLogService<S> {
    inner: S,
    classifier: Arc<RequestClassifier>,
    component: Component,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for HttpLogService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: fmt::Display + Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let (call, echo) = HttpCall::start(&self.classifier, self.component, &req);
        let future = self.inner.call(req);

        Box::pin(async move {
            match future.await {
                Ok(mut response) => {
                    for (name, value) in echo.iter() {
                        if !response.headers().contains_key(name) {
                            response.headers_mut().insert(name.clone(), value.clone());
                        }
                    }
                    call.finish_status(response.status()).emit();
                    Ok(response)
                }
                Err(e) => {
                    call.finish(NOT_APPLICABLE.to_string(), Some(e.to_string())).emit();
                    Err(e)
                }
            }
        })
    }
}

/// What is known about a request before the response arrives.
#[derive(Debug)]
struct HttpCall {
    request_id: String,
    service: String,
    method: String,
    metric_method: String,
    url: String,
    component: Component,
    peer_address: String,
    start_time: String,
    started: Instant,
}

impl HttpCall {
    /// Describe `req`, returning headers to echo on the response.
    fn start<B>(classifier: &RequestClassifier, component: Component, req: &Request<B>) -> (Self, HeaderMap) {
        let started = Instant::now();
        let start_time = format_start_time(&Local::now());

        let target = absolute_target(req);
        let operation = classifier.classify(req.method().as_str(), &target);
        let service = Url::parse(&target)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| NOT_APPLICABLE.to_string());

        let (request_id, echo) = match component {
            Component::Server => {
                let mut metadata = CallMetadata::new(req.headers().clone());
                let id = correlation::resolve(&mut metadata);
                (id, metadata.outbound)
            }
            Component::Client => (correlation::lookup_headers(req.headers()), HeaderMap::new()),
        };

        let peer_address = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| NOT_APPLICABLE.to_string());

        let call = Self {
            request_id,
            service,
            method: operation.to_string(),
            metric_method: operation.metric_label(),
            url: trim_target(&target),
            component,
            peer_address,
            start_time,
            started,
        };
        (call, echo)
    }

    fn finish_status(self, status: StatusCode) -> ApiRequestRecord {
        let error = if status.is_success() {
            None
        } else {
            Some(
                status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| Code::from_http_status(status.as_u16()).to_string()),
            )
        };
        self.finish(status.as_u16().to_string(), error)
    }

    fn finish(self, code: String, error: Option<String>) -> ApiRequestRecord {
        ApiRequestRecord {
            request_id: self.request_id,
            service: self.service,
            method: self.method,
            method_type: METHOD_TYPE.to_string(),
            component: self.component.to_string(),
            protocol: PROTOCOL_REST.to_string(),
            peer_address: self.peer_address,
            start_time: self.start_time,
            time_ms: self.started.elapsed().as_secs_f64() * 1000.0,
            code,
            error,
            url: Some(self.url),
            metric_method: Some(self.metric_method),
        }
    }
}

/// Absolute URL of the request, rebuilt from the Host header for
/// origin-form server requests.
fn absolute_target<B>(req: &Request<B>) -> String {
    let uri = req.uri();
    if uri.scheme().is_some() {
        return uri.to_string();
    }

    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    match req.headers().get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{}{}", host, path),
        None => path.to_string(),
    }
}
