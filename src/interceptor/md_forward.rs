//! Client stage that forwards the serving call's metadata.

use std::task::{Context, Poll};

use http::HeaderMap;
use tower::{Layer, Service};

use crate::interceptor::call::ClientCall;

/// Layer that merges `ClientCall::forwarded` into the request headers.
///
/// Headers already set on the call win.
#[derive(Debug, Clone, Copy, Default)]
pub struct MdForwardLayer;

impl MdForwardLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for MdForwardLayer {
    type Service = MdForwardService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MdForwardService { inner }
    }
}

/// Service produced by [`MdForwardLayer`].
#[derive(Debug, Clone)]
pub struct MdForwardService<S> {
    inner: S,
}

impl<S, M> Service<ClientCall<M>> for MdForwardService<S>
where
    S: Service<ClientCall<M>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut call: ClientCall<M>) -> Self::Future {
        merge_missing(&mut call.headers, &call.forwarded);
        self.inner.call(call)
    }
}

fn merge_missing(headers: &mut HeaderMap, forwarded: &HeaderMap) {
    for name in forwarded.keys() {
        if headers.contains_key(name) {
            continue;
        }
        for value in forwarded.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_merge_keeps_existing_values() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("own"));

        let mut forwarded = HeaderMap::new();
        forwarded.insert("x-request-id", HeaderValue::from_static("inherited"));
        forwarded.append("x-tag", HeaderValue::from_static("a"));
        forwarded.append("x-tag", HeaderValue::from_static("b"));

        merge_missing(&mut headers, &forwarded);
        assert_eq!(headers.get("x-request-id").unwrap(), "own");
        let tags: Vec<_> = headers.get_all("x-tag").iter().collect();
        assert_eq!(tags, vec!["a", "b"]);
    }
}
