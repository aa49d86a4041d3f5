//! Server stage that resolves the correlation id of each call.

use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::correlation::CorrelationAssigner;
use crate::interceptor::call::ServerCall;

/// Layer that assigns `CallContext::correlation_id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationLayer {
    assigner: CorrelationAssigner,
}

impl CorrelationLayer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService {
            inner,
            assigner: self.assigner,
        }
    }
}

/// Service produced by [`CorrelationLayer`].
#[derive(Debug, Clone)]
pub struct CorrelationService<S> {
    inner: S,
    assigner: CorrelationAssigner,
}

impl<S, M> Service<ServerCall<M>> for CorrelationService<S>
where
    S: Service<ServerCall<M>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut call: ServerCall<M>) -> Self::Future {
        call.context.correlation_id = self.assigner.resolve(&mut call.metadata);
        self.inner.call(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::call::MethodKind;
    use crate::metadata::{CallMetadata, REQUEST_ID_METADATA_KEY};
    use http::{HeaderMap, HeaderValue};
    use tower::{service_fn, ServiceExt};

    async fn seen_id(inbound: HeaderMap) -> (String, Option<String>) {
        let svc = CorrelationLayer::new().layer(service_fn(|call: ServerCall<()>| async move {
            let outbound = call.metadata.outbound_str(REQUEST_ID_METADATA_KEY).map(str::to_string);
            Ok::<_, std::convert::Infallible>((call.context.correlation_id, outbound))
        }));
        let call = ServerCall::new("/svc.v1.Svc/Get", MethodKind::Unary, CallMetadata::new(inbound), ());
        svc.oneshot(call).await.unwrap()
    }

    #[tokio::test]
    async fn test_inbound_id_reused() {
        let mut inbound = HeaderMap::new();
        inbound.insert(REQUEST_ID_METADATA_KEY, HeaderValue::from_static("fromCall"));
        let (id, outbound) = seen_id(inbound).await;
        assert_eq!(id, "fromCall");
        assert_eq!(outbound, None);
    }

    #[tokio::test]
    async fn test_missing_id_generated_outbound() {
        let (id, outbound) = seen_id(HeaderMap::new()).await;
        assert_eq!(id.len(), 8);
        assert_eq!(outbound.as_deref(), Some(id.as_str()));
    }
}
