//! The persistable unit of application state.
//!
//! A slice is an explicit capability object: storage key plus the
//! serialize/deserialize pair, passed around as a value. Nothing is
//! tacked onto reducer functions at runtime, and the reducer's own
//! transition logic stays outside this crate.

use serde_json::Value;
use std::sync::Arc;
use strata_core::Error;

/// Error marking a slice payload that failed to encode or decode.
///
/// Any `Err` from `deserialize` is the "invalid" signal: callers treat
/// the candidate as absent and fall back, they never propagate it.
#[derive(Debug, thiserror::Error)]
pub enum SliceError {
    #[error("invalid slice payload: {0}")]
    Invalid(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One persistable slice of application state.
pub trait StateSlice: Send + Sync {
    /// Unique name of this slice's storage partition.
    fn storage_key(&self) -> &str;

    /// Encode live state into a JSON-safe payload.
    fn serialize(&self, state: &Value) -> Result<Value, SliceError>;

    /// Decode a persisted payload back into live state.
    fn deserialize(&self, raw: &Value) -> Result<Value, SliceError>;
}

/// Passthrough slice for state that is already JSON-safe.
pub struct JsonSlice {
    storage_key: String,
}

impl JsonSlice {
    pub fn new(storage_key: impl Into<String>) -> Self {
        Self { storage_key: storage_key.into() }
    }
}

impl StateSlice for JsonSlice {
    fn storage_key(&self) -> &str {
        &self.storage_key
    }

    fn serialize(&self, state: &Value) -> Result<Value, SliceError> {
        Ok(state.clone())
    }

    fn deserialize(&self, raw: &Value) -> Result<Value, SliceError> {
        Ok(raw.clone())
    }
}

/// Registry of every persistable slice, keyed by storage key.
#[derive(Default)]
pub struct SliceRegistry {
    slices: Vec<Arc<dyn StateSlice>>,
}

impl SliceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slice. Storage keys must be unique across the
    /// registry; a collision is a programming error.
    pub fn register(&mut self, slice: Arc<dyn StateSlice>) -> Result<(), Error> {
        if self.slices.iter().any(|s| s.storage_key() == slice.storage_key()) {
            return Err(Error::DuplicateStorageKey(slice.storage_key().to_string()));
        }
        self.slices.push(slice);
        Ok(())
    }

    pub fn get(&self, storage_key: &str) -> Option<&Arc<dyn StateSlice>> {
        self.slices.iter().find(|s| s.storage_key() == storage_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn StateSlice>> {
        self.slices.iter()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}
