//! Cache-then-network request handling.

use crate::hash::cache_key;
use crate::request::{FetchError, Fetcher, RequestParams};
use crate::whitelist::Whitelist;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use strata_core::StorageBackend;

/// Transport bookkeeping field stripped from cached bodies.
const HEADERS_FIELD: &str = "_headers";

/// Sync metadata stored alongside a cached response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMeta {
    pub key: String,
    /// RFC 3339 time of the last successful network sync.
    pub synced: String,
    pub syncing: bool,
}

/// One cached response: the last successful body for a descriptor,
/// plus the descriptor itself for inspection and replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRequestEntry {
    #[serde(rename = "__sync")]
    pub sync: SyncMeta,
    pub body: Value,
    pub params: RequestParams,
}

impl CachedRequestEntry {
    fn new(key: String, body: Value, params: RequestParams) -> Self {
        let sync = SyncMeta { key, synced: Utc::now().to_rfc3339(), syncing: false };
        Self { sync, body, params }
    }
}

/// Wraps a network fetcher with local-cache-first, network-revalidate
/// delivery for whitelisted GET requests.
///
/// The callback may run zero, one, or two times: once with a cached
/// body (best effort, non-authoritative) and once with the network
/// result. The network result, when it arrives, always follows the
/// cached one, so callers must be idempotent with respect to repeated
/// invocation.
pub struct SyncHandler<F> {
    fetcher: F,
    cache: Arc<dyn StorageBackend>,
    whitelist: Whitelist,
}

impl<F: Fetcher> SyncHandler<F> {
    pub fn new(fetcher: F, cache: Arc<dyn StorageBackend>) -> Self {
        Self { fetcher, cache, whitelist: Whitelist::new() }
    }

    pub fn with_whitelist(mut self, whitelist: Whitelist) -> Self {
        self.whitelist = whitelist;
        self
    }

    /// Handle one request, delivering results through `callback`.
    ///
    /// Bypass and non-whitelisted requests delegate straight to the
    /// network layer and invoke the callback exactly once with its
    /// result, cache untouched.
    pub async fn handle<C>(&self, params: RequestParams, mut callback: C)
    where
        C: FnMut(Result<Value, FetchError>) + Send,
    {
        if params.proxy_connection || !self.whitelist.allows(&params) {
            callback(self.fetcher.fetch(&params).await);
            return;
        }

        let key = cache_key(&params);

        if let Some(body) = self.cached_body(&key).await {
            callback(Ok(body));
        }

        // The real request always goes out, cache hit or not.
        match self.fetcher.fetch(&params).await {
            Ok(body) => {
                callback(Ok(body.clone()));
                self.store_fresh(key, body, params).await;
            }
            // Authoritative failure; a stale cache entry is left in
            // place rather than deleted.
            Err(err) => callback(Err(err)),
        }
    }

    /// Best-effort cache read: every failure is a miss.
    async fn cached_body(&self, key: &str) -> Option<Value> {
        let raw = match self.cache.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::debug!(key, error = %err, "cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_value::<CachedRequestEntry>(raw) {
            Ok(entry) => Some(entry.body),
            Err(err) => {
                tracing::debug!(key, error = %err, "undecodable cache entry, treating as miss");
                None
            }
        }
    }

    /// Best-effort cache write after a successful fetch.
    async fn store_fresh(&self, key: String, body: Value, params: RequestParams) {
        let entry = CachedRequestEntry::new(key.clone(), strip_headers(body), params);
        let value = match serde_json::to_value(&entry) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(%key, error = %err, "failed to encode cache entry");
                return;
            }
        };

        if let Err(err) = self.cache.set(&key, value).await {
            tracing::warn!(%key, error = %err, "failed to write cache entry");
        }
    }
}

/// Remove the transport bookkeeping field before caching; the cached
/// body is payload only.
fn strip_headers(mut body: Value) -> Value {
    if let Some(fields) = body.as_object_mut() {
        fields.remove(HEADERS_FIELD);
    }
    body
}
