//! In-memory cache fronting the async storage backend.

use crate::keys::{CLEARED_FLAG_KEY, PERSISTENCE_PREFIXES};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use strata_core::{Error, StorageBackend, StorageRecord};

/// Single in-memory map from persisted key to record, loaded once at
/// boot and kept in step with every write.
///
/// Reads never touch the backend: rehydration stays synchronous and can
/// run before the first paint. The map is mutated only through `load`,
/// `set`, and `clear`.
pub struct StateStore {
    backend: Arc<dyn StorageBackend>,
    records: RwLock<HashMap<String, StorageRecord>>,
}

impl StateStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend, records: RwLock::new(HashMap::new()) }
    }

    /// Load every recognized record into memory.
    ///
    /// Must be awaited once before `get` is useful. Storage failures are
    /// logged and leave the cache empty; boot continues with defaults.
    pub async fn load(&self) {
        let entries = match self.backend.get_all(PERSISTENCE_PREFIXES).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load persisted state, starting empty");
                return;
            }
        };

        let mut records = self.records.write().expect("state cache lock poisoned");
        records.clear();
        for (key, value) in entries {
            // The cleared flag shares the namespace but is not a record.
            if key == CLEARED_FLAG_KEY {
                continue;
            }
            records.insert(key, StorageRecord::from_stored(value));
        }
        tracing::debug!(count = records.len(), "loaded persisted state");
    }

    /// Synchronous read from the in-memory cache only.
    pub fn get(&self, key: &str) -> Option<StorageRecord> {
        self.records.read().expect("state cache lock poisoned").get(key).cloned()
    }

    /// Write through to the backend, then update the cache.
    ///
    /// Failures are isolated per key: an error writing one record leaves
    /// every other key untouched and the cache unchanged for this one.
    pub async fn set(&self, key: &str, record: StorageRecord) -> Result<(), Error> {
        self.backend.set(key, record.to_stored()).await?;
        self.records
            .write()
            .expect("state cache lock poisoned")
            .insert(key.to_string(), record);
        Ok(())
    }

    /// Empty the cache and wipe the backing namespace. Idempotent.
    pub async fn clear(&self) -> Result<(), Error> {
        self.records.write().expect("state cache lock poisoned").clear();
        self.backend.remove_all().await
    }

    /// Delete records older than `max_age`.
    ///
    /// The read path only ignores over-age records; this sweep is for
    /// long-lived installs that would otherwise accumulate dead rows.
    /// Returns the number of deleted records.
    pub async fn purge_stale(&self, max_age: chrono::Duration) -> Result<u64, Error> {
        let cutoff = chrono::Utc::now() - max_age;
        let stale: Vec<String> = {
            let records = self.records.read().expect("state cache lock poisoned");
            records
                .iter()
                .filter(|(_, record)| match record.written_at() {
                    Some(written_at) => written_at < cutoff,
                    None => true,
                })
                .map(|(key, _)| key.clone())
                .collect()
        };

        // Rewrites survivors rather than deleting row by row: the
        // backend surface has no per-key delete.
        if stale.is_empty() {
            return Ok(0);
        }

        let survivors: Vec<(String, StorageRecord)> = {
            let mut records = self.records.write().expect("state cache lock poisoned");
            for key in &stale {
                records.remove(key);
            }
            records.iter().map(|(k, r)| (k.clone(), r.clone())).collect()
        };

        self.backend.remove_all().await?;
        for (key, record) in survivors {
            if let Err(err) = self.backend.set(&key, record.to_stored()).await {
                tracing::warn!(%key, error = %err, "failed to rewrite record during purge");
            }
        }

        Ok(stale.len() as u64)
    }

    /// Whether persisted state was intentionally wiped this session.
    pub async fn cleared_flag(&self) -> bool {
        match self.backend.get(CLEARED_FLAG_KEY).await {
            Ok(Some(Value::Bool(true))) => true,
            Ok(_) => false,
            Err(err) => {
                tracing::debug!(error = %err, "failed to read cleared flag");
                false
            }
        }
    }

    /// Mark persisted state as intentionally wiped.
    pub async fn set_cleared_flag(&self) -> Result<(), Error> {
        self.backend.set(CLEARED_FLAG_KEY, Value::Bool(true)).await
    }
}
