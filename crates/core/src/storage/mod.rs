//! SQLite-backed key-value storage with namespaced backends.
//!
//! This module provides the async storage layer shared by the state
//! persistence and request cache subsystems:
//!
//! - A single `records` table, partitioned by namespace so the two
//!   subsystems never see each other's entries
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - An in-memory backend with the same surface, for tests and embedders
//!   that do not want a database file

pub mod backend;
pub mod connection;
pub mod migrations;

pub use backend::{MemoryBackend, STATE_NAMESPACE, SYNC_NAMESPACE, SqliteBackend, StorageBackend};
pub use connection::StoreDb;
