//! Correlation id issuance and lookup.
//!
//! # Responsibilities
//! - Reuse the caller's `x-request-id` when one arrives with the call
//! - Otherwise mint a short id and publish it in outbound metadata
//! - Provide a single lookup path for every later stage
//!
//! # Design Decisions
//! - Ids are 6 random bytes, unpadded URL-safe base64 (8 characters)
//! - Inbound metadata is never mutated; generated ids go outbound only
//! - Neither resolve nor lookup can fail
//! - Header bytes that are not valid UTF-8 are read lossily; a caller's id
//!   is never replaced

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use rand::RngCore;

use crate::metadata::{CallMetadata, REQUEST_ID_METADATA_KEY};

/// Number of random bytes behind a generated id.
const ID_BYTES: usize = 6;

/// Issues and forwards correlation ids for calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationAssigner;

impl CorrelationAssigner {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the correlation id for a call, generating one if needed.
    pub fn resolve(&self, metadata: &mut CallMetadata) -> String {
        resolve(metadata)
    }

    /// Read the correlation id already resolved for a call.
    pub fn lookup(&self, metadata: &CallMetadata) -> String {
        lookup(metadata)
    }
}

/// Return the inbound id unchanged, or generate one and attach it outbound.
pub fn resolve(metadata: &mut CallMetadata) -> String {
    if let Some(existing) = request_id(&metadata.inbound).or_else(|| request_id(&metadata.outbound)) {
        return existing;
    }

    let id = generate_id();
    // base64url output is always a valid header value
    if let Ok(value) = HeaderValue::from_str(&id) {
        metadata
            .outbound
            .insert(HeaderName::from_static(REQUEST_ID_METADATA_KEY), value);
    }
    tracing::trace!(request_id = %id, "Generated correlation id");
    id
}

/// Inbound header first, then outbound metadata, else empty.
pub fn lookup(metadata: &CallMetadata) -> String {
    request_id(&metadata.inbound)
        .or_else(|| request_id(&metadata.outbound))
        .unwrap_or_default()
}

/// Correlation id carried in a plain header map, else empty.
pub fn lookup_headers(headers: &HeaderMap) -> String {
    request_id(headers).unwrap_or_default()
}

fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_METADATA_KEY)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// Generate a fresh 8-character id.
pub fn generate_id() -> String {
    let mut buf = [0u8; ID_BYTES];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}
