//! Cache eligibility for request descriptors.

use crate::request::{Method, RequestParams};
use regex::RegexSet;

/// Path patterns known to be safe to cache: collection reads whose
/// responses are freely re-fetchable and carry no one-time payloads.
const DEFAULT_PATTERNS: &[&str] = &[
    r"^/me/posts(/|$)",
    r"^/sites/[^/]+/posts(/|$)",
    r"^/sites/[^/]+/media(/|$)",
    r"^/read/feed(/|$)",
    r"^/read/following/posts(/|$)",
];

/// Pure predicate deciding whether a request is eligible for caching.
///
/// Only GET requests matching an allowed pattern qualify; everything
/// else never touches the cache store. Note that a cached entry is not
/// invalidated when the pattern list changes between deployments; it
/// simply stops being read.
pub struct Whitelist {
    patterns: RegexSet,
}

impl Whitelist {
    /// The fixed default allow-list.
    pub fn new() -> Self {
        Self::with_patterns(DEFAULT_PATTERNS).expect("default whitelist patterns are valid")
    }

    /// Build a whitelist over a custom pattern list.
    pub fn with_patterns<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self { patterns: RegexSet::new(patterns)? })
    }

    /// Whether `params` may be served from and written to the cache.
    pub fn allows(&self, params: &RequestParams) -> bool {
        params.method == Method::Get && self.patterns.is_match(&params.path)
    }
}

impl Default for Whitelist {
    fn default() -> Self {
        Self::new()
    }
}
