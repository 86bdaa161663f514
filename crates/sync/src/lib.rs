//! Request cache: local-cache-first, network-revalidate delivery.
//!
//! Wraps an arbitrary network request function so whitelisted GET
//! requests are served from a local cache immediately (when present)
//! while the real request always goes out; both results reach the same
//! callback in arrival order, and the fresh result refreshes the cache.
//!
//! The cache is a pure optimization: its read and write failures are
//! logged and swallowed, and only genuine network errors reach the
//! caller.

pub mod handler;
pub mod hash;
pub mod request;
pub mod whitelist;

pub use handler::{CachedRequestEntry, SyncHandler, SyncMeta};
pub use hash::cache_key;
pub use request::{FetchError, Fetcher, Method, RequestParams};
pub use whitelist::Whitelist;
