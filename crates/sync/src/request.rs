//! Request descriptors and the network seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// HTTP method of a request descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        };
        f.write_str(name)
    }
}

/// Describes one REST request.
///
/// Query parameters are kept sorted so a descriptor always serializes
/// the same way, which cache keys depend on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    pub method: Method,

    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<BTreeMap<String, String>>,

    /// Internal proxy connection requests bypass caching entirely.
    #[serde(default)]
    pub proxy_connection: bool,
}

fn default_api_version() -> String {
    "1.1".into()
}

impl RequestParams {
    /// Convenience constructor for a GET descriptor.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            method: Method::Get,
            path: path.into(),
            query: None,
            proxy_connection: false,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query = Some(query);
        self
    }
}

/// Error from the underlying network layer.
///
/// The only error type that ever reaches a caller's callback: cache
/// failures are swallowed, network failures are authoritative.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("http status {status}")]
    Http { status: u16 },

    #[error("request timed out: {0}")]
    Timeout(String),
}

/// The network seam: performs the real request for a descriptor.
///
/// Timeout and retry policy belong to the implementation, not to the
/// caching layer wrapped around it.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, params: &RequestParams) -> Result<Value, FetchError>;
}
