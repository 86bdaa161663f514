//! Unified error types for the strata workspace.

use tokio_rusqlite::rusqlite;

/// Unified infrastructure error for storage, migrations, and serialization.
///
/// Persistence is an optimization layer: callers on the rehydration and
/// caching paths are expected to log these and fall back to fresh data
/// rather than propagate them to application boot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(tokio_rusqlite::Error),

    /// Backend storage failure outside the database layer (quota
    /// exceeded, storage unavailable, embedder-specific backends).
    #[error("storage error: {0}")]
    Storage(String),

    /// Migration failed to apply.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// JSON encoding or decoding of a stored value failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Two slices were registered under the same storage key.
    #[error("duplicate storage key: {0}")]
    DuplicateStorageKey(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_display() {
        let err = Error::DuplicateStorageKey("sites".to_string());
        assert!(err.to_string().contains("duplicate storage key"));
        assert!(err.to_string().contains("sites"));
    }

    #[test]
    fn test_serialization_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
