//! Stable cache key generation for request descriptors.

use crate::request::RequestParams;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Compute the cache key for a request descriptor.
///
/// Digest over version, method, path, and the serialized query string,
/// so identical descriptors always map to the same key and any
/// differing field changes it. Hashing keeps keys storage-safe and of
/// bounded length no matter how long the path or query grows.
pub fn cache_key(params: &RequestParams) -> String {
    let mut hasher = Sha256::new();
    hasher.update(params.api_version.as_bytes());
    hasher.update(b"-");
    hasher.update(params.method.to_string().as_bytes());
    hasher.update(b"-");
    hasher.update(params.path.as_bytes());
    if let Some(query) = &params.query {
        hasher.update(b"-");
        hasher.update(serialize_query(query).as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Serialize query parameters deterministically (sorted key order).
fn serialize_query(query: &BTreeMap<String, String>) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}
