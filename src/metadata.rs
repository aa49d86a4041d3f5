//! Call metadata and the well-known keys carried in it.

use http::header::{HeaderMap, HeaderName, HeaderValue};

/// Metadata key carrying the correlation id.
pub const REQUEST_ID_METADATA_KEY: &str = "x-request-id";

/// Metadata key carrying the serialized log context side channel.
pub const CTX_LOG_METADATA_KEY: &str = "ctxlog-data";

/// Request metadata received with a call and metadata sent back with it.
///
/// On the server side `inbound` holds the request headers and `outbound` the
/// response headers/trailers. The correlation id lives in whichever side
/// [`crate::correlation::CorrelationAssigner`] put it.
#[derive(Debug, Clone, Default)]
pub struct CallMetadata {
    pub inbound: HeaderMap,
    pub outbound: HeaderMap,
}

impl CallMetadata {
    pub fn new(inbound: HeaderMap) -> Self {
        Self {
            inbound,
            outbound: HeaderMap::new(),
        }
    }

    /// Inbound value for `key`, if present and valid UTF-8.
    pub fn inbound_str(&self, key: &str) -> Option<&str> {
        header_str(&self.inbound, key)
    }

    /// Outbound value for `key`, if present and valid UTF-8.
    pub fn outbound_str(&self, key: &str) -> Option<&str> {
        header_str(&self.outbound, key)
    }

    /// Headers to forward on client calls made while serving this call.
    ///
    /// Everything inbound except the log side channel, plus the resolved
    /// correlation id when it was generated locally.
    pub fn forwardable(&self) -> HeaderMap {
        let mut headers = self.inbound.clone();
        headers.remove(CTX_LOG_METADATA_KEY);

        let request_id = crate::correlation::lookup(self);
        if !request_id.is_empty() && !headers.contains_key(REQUEST_ID_METADATA_KEY) {
            if let Ok(value) = HeaderValue::from_str(&request_id) {
                headers.insert(HeaderName::from_static(REQUEST_ID_METADATA_KEY), value);
            }
        }
        headers
    }
}

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, key: &str) -> Option<&'a str> {
    headers.get(key).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwardable_drops_side_channel() {
        let mut inbound = HeaderMap::new();
        inbound.insert("x-tenant", HeaderValue::from_static("t1"));
        inbound.insert(CTX_LOG_METADATA_KEY, HeaderValue::from_static("{}"));
        let mut metadata = CallMetadata::new(inbound);
        metadata
            .outbound
            .insert(REQUEST_ID_METADATA_KEY, HeaderValue::from_static("abcdEFGH"));

        let forwarded = metadata.forwardable();
        assert_eq!(header_str(&forwarded, "x-tenant"), Some("t1"));
        assert_eq!(header_str(&forwarded, REQUEST_ID_METADATA_KEY), Some("abcdEFGH"));
        assert!(!forwarded.contains_key(CTX_LOG_METADATA_KEY));
    }
}
