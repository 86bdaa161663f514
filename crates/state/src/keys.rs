//! Persisted key layout.
//!
//! State records live under `redux-state-<user>[:<storage-key>]`; the
//! bare namespace key belongs to the legacy monolithic slice. The
//! loader also picks up `query-state-*` entries, reserved for the
//! query-cache collaborator.

use std::fmt;

/// Prefix for persisted application state records.
pub const STATE_KEY_PREFIX: &str = "redux-state-";

/// Prefix reserved for the query-cache collaborator.
pub const QUERY_KEY_PREFIX: &str = "query-state-";

/// Key prefixes recognized by the loader.
pub const PERSISTENCE_PREFIXES: &[&str] = &[STATE_KEY_PREFIX, QUERY_KEY_PREFIX];

/// Flag set when persisted state was intentionally wiped by a
/// development behavior. Not a state record; never treated as one.
pub const CLEARED_FLAG_KEY: &str = "was-state-randomly-cleared";

/// Reserved storage key for the legacy monolithic slice.
pub const ROOT_STORAGE_KEY: &str = "root";

/// Storage key with the login-aware fallback during rehydration.
pub const SIGNUP_STORAGE_KEY: &str = "signup";

/// The user namespace a persisted record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserId {
    LoggedIn(u64),
    LoggedOut,
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::LoggedIn(id) => write!(f, "{id}"),
            UserId::LoggedOut => write!(f, "logged-out"),
        }
    }
}

/// Build the persisted key for a slice in a user's namespace.
pub fn state_key(user: UserId, storage_key: &str) -> String {
    if storage_key == ROOT_STORAGE_KEY {
        format!("{STATE_KEY_PREFIX}{user}")
    } else {
        format!("{STATE_KEY_PREFIX}{user}:{storage_key}")
    }
}
