//! The persisted record envelope.
//!
//! Every entry written by the persistence layer carries a write timestamp
//! used for freshness comparisons during rehydration. The stored form
//! inlines the timestamp into the payload object as `_timestamp`; field
//! names starting with `_` are reserved for the storage layout.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Field carrying the write time, in epoch milliseconds.
pub const TIMESTAMP_FIELD: &str = "_timestamp";

/// Wrapper field for the rare non-object payload.
const WRAPPED_STATE_FIELD: &str = "_state";

/// One persisted slice of state, paired with the time it was written.
///
/// A missing timestamp means the record is maximally stale: readers must
/// treat it as absent rather than guess at its age.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageRecord {
    pub state: Value,
    pub timestamp: Option<i64>,
}

impl StorageRecord {
    /// Build a record stamped with the current time.
    ///
    /// The timestamp is always taken at the moment of construction,
    /// never backdated.
    pub fn new(state: Value) -> Self {
        Self::with_timestamp(state, Utc::now().timestamp_millis())
    }

    /// Build a record with an explicit write time (epoch milliseconds).
    pub fn with_timestamp(state: Value, timestamp: i64) -> Self {
        Self { state, timestamp: Some(timestamp) }
    }

    /// The write time as a `DateTime`, if the record has one.
    pub fn written_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    /// Encode for storage: object payloads get `_timestamp` inlined,
    /// anything else is wrapped.
    pub fn to_stored(&self) -> Value {
        match &self.state {
            Value::Object(fields) => {
                let mut fields = fields.clone();
                if let Some(ts) = self.timestamp {
                    fields.insert(TIMESTAMP_FIELD.to_string(), Value::from(ts));
                }
                Value::Object(fields)
            }
            other => {
                let mut fields = Map::new();
                fields.insert(WRAPPED_STATE_FIELD.to_string(), other.clone());
                if let Some(ts) = self.timestamp {
                    fields.insert(TIMESTAMP_FIELD.to_string(), Value::from(ts));
                }
                Value::Object(fields)
            }
        }
    }

    /// Decode a stored value. Never fails: malformed or missing
    /// timestamps simply produce a record with `timestamp: None`.
    pub fn from_stored(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self { state: value, timestamp: None };
        };

        let timestamp = fields.remove(TIMESTAMP_FIELD).and_then(|v| v.as_i64());

        let state = if fields.len() == 1 && fields.contains_key(WRAPPED_STATE_FIELD) {
            fields.remove(WRAPPED_STATE_FIELD).unwrap_or(Value::Null)
        } else {
            Value::Object(fields)
        };

        Self { state, timestamp }
    }
}
