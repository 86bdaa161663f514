//! Namespaced async key-value backends.
//!
//! The persistence and request cache subsystems share one storage
//! abstraction but live in disjoint namespaces: a backend instance is
//! bound to its namespace at construction and `remove_all` only wipes
//! its own rows.

use crate::Error;
use crate::storage::StoreDb;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Namespace for persisted application state records.
pub const STATE_NAMESPACE: &str = "state";

/// Namespace for cached request/response records.
pub const SYNC_NAMESPACE: &str = "sync";

/// Async key-value store surface consumed by the persistence and request
/// cache layers.
///
/// Writes to different keys are unordered relative to each other, but
/// successive writes to the same key must be applied in call order.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read every entry whose key starts with one of `prefixes`.
    ///
    /// Entries whose stored text is not valid JSON are skipped with a
    /// debug log; a corrupted row must not hide its siblings.
    async fn get_all(&self, prefixes: &[&str]) -> Result<HashMap<String, Value>, Error>;

    /// Read a single entry. Returns None if the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Value>, Error>;

    /// Insert or overwrite a single entry.
    async fn set(&self, key: &str, value: Value) -> Result<(), Error>;

    /// Remove every entry in this backend's namespace.
    async fn remove_all(&self) -> Result<(), Error>;
}

/// SQLite-backed storage bound to one namespace of the `records` table.
#[derive(Clone, Debug)]
pub struct SqliteBackend {
    db: StoreDb,
    namespace: String,
}

impl SqliteBackend {
    /// Bind a backend to `namespace` on an open database.
    pub fn new(db: StoreDb, namespace: impl Into<String>) -> Self {
        Self { db, namespace: namespace.into() }
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn get_all(&self, prefixes: &[&str]) -> Result<HashMap<String, Value>, Error> {
        if prefixes.is_empty() {
            return Ok(HashMap::new());
        }

        let namespace = self.namespace.clone();
        let patterns: Vec<String> = prefixes.iter().map(|p| format!("{p}%")).collect();

        self.db
            .conn
            .call(move |conn| -> Result<HashMap<String, Value>, Error> {
                let clauses = vec!["key LIKE ?"; patterns.len()].join(" OR ");
                let sql = format!("SELECT key, value FROM records WHERE namespace = ? AND ({clauses})");
                let mut stmt = conn.prepare(&sql)?;

                let mut bind = Vec::with_capacity(patterns.len() + 1);
                bind.push(namespace);
                bind.extend(patterns);

                let rows = stmt.query_map(rusqlite::params_from_iter(bind), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;

                let mut entries = HashMap::new();
                for row in rows {
                    let (key, raw) = row?;
                    match serde_json::from_str(&raw) {
                        Ok(value) => {
                            entries.insert(key, value);
                        }
                        Err(err) => tracing::debug!(%key, error = %err, "skipping undecodable record"),
                    }
                }
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, Error> {
        let namespace = self.namespace.clone();
        let key = key.to_string();

        self.db
            .conn
            .call(move |conn| -> Result<Option<Value>, Error> {
                let result = conn.query_row(
                    "SELECT value FROM records WHERE namespace = ?1 AND key = ?2",
                    params![namespace, key],
                    |row| row.get::<_, String>(0),
                );

                match result {
                    Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), Error> {
        let namespace = self.namespace.clone();
        let key = key.to_string();
        let raw = serde_json::to_string(&value)?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO records (namespace, key, value, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(namespace, key) DO UPDATE SET
                         value = excluded.value,
                         updated_at = excluded.updated_at",
                    params![namespace, key, raw, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn remove_all(&self) -> Result<(), Error> {
        let namespace = self.namespace.clone();

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM records WHERE namespace = ?1", params![namespace])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}

/// In-memory storage for tests and embedders without a database file.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get_all(&self, prefixes: &[&str]) -> Result<HashMap<String, Value>, Error> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(key, _)| prefixes.iter().any(|p| key.starts_with(p)))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, Error> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), Error> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_all(&self) -> Result<(), Error> {
        self.entries.write().await.clear();
        Ok(())
    }
}
