//! Client stage that retries transient failures of unary calls.

use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tower::{Layer, Service, ServiceExt};

use crate::interceptor::call::{ClientCall, MethodKind};
use crate::resilience::RetryPolicy;
use crate::status::Status;

/// Layer applying a [`RetryPolicy`] to unary client calls.
#[derive(Debug, Clone, Default)]
pub struct RetryLayer {
    policy: RetryPolicy,
}

impl RetryLayer {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            policy: self.policy.clone(),
        }
    }
}

/// Service produced by [`RetryLayer`].
#[derive(Debug, Clone)]
pub struct RetryService<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S, M> Service<ClientCall<M>> for RetryService<S>
where
    M: Clone + Send + 'static,
    S: Service<ClientCall<M>, Error = Status> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = Status;
    type Future = BoxFuture<'static, Result<S::Response, Status>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: ClientCall<M>) -> Self::Future {
        // The instance polled ready serves this call; keep a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if call.method_kind != MethodKind::Unary {
            return Box::pin(inner.call(call));
        }

        let policy = self.policy.clone();
        Box::pin(async move {
            let cancel = call.cancel.clone();
            policy
                .execute(&cancel, move |attempt| {
                    let call = call.clone();
                    let svc = inner.clone();
                    async move {
                        tracing::debug!(attempt, method = %call.full_method, "Issuing call");
                        svc.oneshot(call).await
                    }
                })
                .await
        })
    }
}
