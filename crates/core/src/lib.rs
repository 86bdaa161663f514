//! Core types and shared infrastructure for strata.
//!
//! This crate provides:
//! - Async key-value storage backends (SQLite and in-memory) with
//!   automatic schema migrations
//! - The persisted record envelope with write timestamps
//! - Unified error types
//! - Layered configuration

pub mod config;
pub mod error;
pub mod record;
pub mod storage;

pub use config::{AppConfig, DevelopmentBehavior};
pub use error::Error;
pub use record::StorageRecord;
pub use storage::{MemoryBackend, STATE_NAMESPACE, SYNC_NAMESPACE, SqliteBackend, StorageBackend, StoreDb};
