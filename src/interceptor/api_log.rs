//! Server stage that emits the per-call record.

use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::interceptor::call::ServerCall;
use crate::status::{Code, Status};

/// Layer that logs one `finished call` record per server call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiRequestLogLayer;

impl ApiRequestLogLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for ApiRequestLogLayer {
    type Service = ApiRequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ApiRequestLogService { inner }
    }
}

/// Service produced by [`ApiRequestLogLayer`].
#[derive(Debug, Clone)]
pub struct ApiRequestLogService<S> {
    inner: S,
}

impl<S, M> Service<ServerCall<M>> for ApiRequestLogService<S>
where
    S: Service<ServerCall<M>, Error = Status>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = Status;
    type Future = BoxFuture<'static, Result<S::Response, Status>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: ServerCall<M>) -> Self::Future {
        let context = call.context.clone();
        let future = self.inner.call(call);

        Box::pin(async move {
            let result = future.await;
            let record = match &result {
                Ok(_) => context.finish(Code::Ok, None),
                Err(status) => context.finish(status.code(), Some(status.message().to_string())),
            };
            record.emit();
            result
        })
    }
}
