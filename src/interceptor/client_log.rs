//! Client stage that records every outbound call without delaying it.
//!
//! Each call gets a detached task on the shared `BackgroundTasks` set. The
//! task waits for the outcome on a oneshot channel and emits the record; a
//! call dropped before it settles is recorded as `CANCELLED`.

use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use tower::{Layer, Service};

use crate::interceptor::call::ClientCall;
use crate::lifecycle::BackgroundTasks;
use crate::status::{Code, Status};

struct Outcome {
    code: Code,
    error: Option<String>,
    elapsed: Duration,
}

/// Layer that logs client calls on background tasks.
#[derive(Debug, Clone)]
pub struct ClientLogLayer {
    tasks: BackgroundTasks,
}

impl ClientLogLayer {
    pub fn new(tasks: BackgroundTasks) -> Self {
        Self { tasks }
    }
}

impl<S> Layer<S> for ClientLogLayer {
    type Service = ClientLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientLogService {
            inner,
            tasks: self.tasks.clone(),
        }
    }
}

/// Service produced by [`ClientLogLayer`].
#[derive(Debug, Clone)]
pub struct ClientLogService<S> {
    inner: S,
    tasks: BackgroundTasks,
}

impl<S, M> Service<ClientCall<M>> for ClientLogService<S>
where
    S: Service<ClientCall<M>, Error = Status>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = Status;
    type Future = BoxFuture<'static, Result<S::Response, Status>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: ClientCall<M>) -> Self::Future {
        let context = call.context();
        let started = std::time::Instant::now();
        let (tx, rx) = oneshot::channel::<Outcome>();

        self.tasks.spawn(async move {
            let record = match rx.await {
                Ok(outcome) => context.finish_with_elapsed(outcome.code, outcome.error, outcome.elapsed),
                Err(_) => context.finish(Code::Cancelled, Some("call dropped before completion".to_string())),
            };
            record.emit();
        });

        let future = self.inner.call(call);
        Box::pin(async move {
            let result = future.await;
            let (code, error) = match &result {
                Ok(_) => (Code::Ok, None),
                Err(status) => (status.code(), Some(status.message().to_string())),
            };
            let _ = tx.send(Outcome {
                code,
                error,
                elapsed: started.elapsed(),
            });
            result
        })
    }
}
