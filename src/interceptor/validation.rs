//! Server stage that rejects invalid requests before the handler runs.

use std::task::{Context, Poll};

use futures_util::future::{ready, Either, Ready};
use tower::{Layer, Service};

use crate::interceptor::call::ServerCall;
use crate::status::Status;

/// Request message constraints.
pub trait Validate {
    /// Every violated constraint, described for the caller.
    fn validate(&self) -> Result<(), Vec<String>>;
}

impl Validate for () {
    fn validate(&self) -> Result<(), Vec<String>> {
        Ok(())
    }
}

/// Layer that answers `INVALID_ARGUMENT` for requests failing [`Validate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationLayer {
    fail_fast: bool,
}

impl ValidationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report only the first violation.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

impl<S> Layer<S> for ValidationLayer {
    type Service = ValidationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ValidationService {
            inner,
            fail_fast: self.fail_fast,
        }
    }
}

/// Service produced by [`ValidationLayer`].
#[derive(Debug, Clone)]
pub struct ValidationService<S> {
    inner: S,
    fail_fast: bool,
}

impl<S, M> Service<ServerCall<M>> for ValidationService<S>
where
    M: Validate,
    S: Service<ServerCall<M>, Error = Status>,
{
    type Response = S::Response;
    type Error = Status;
    type Future = Either<Ready<Result<S::Response, Status>>, S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: ServerCall<M>) -> Self::Future {
        match call.message.validate() {
            Ok(()) => Either::Right(self.inner.call(call)),
            Err(mut violations) => {
                if self.fail_fast {
                    violations.truncate(1);
                }
                let error = violations.join("; ");
                tracing::warn!(
                    method = %call.context.full_method,
                    request_type = std::any::type_name::<M>(),
                    error = %error,
                    "Validation failed"
                );
                Either::Left(ready(Err(Status::invalid_argument(error))))
            }
        }
    }
}
