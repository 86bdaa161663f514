//! Initial-state computation from persisted and server-provided sources.
//!
//! Each slice is rehydrated independently: the freshest of the server
//! bootstrap candidate and the locally persisted candidate wins, and any
//! rejection (missing timestamp, over age, failed decode) silently
//! removes that candidate without touching its siblings. A slice with no
//! usable candidate gets `None`, and its own default state applies.

use crate::keys::{SIGNUP_STORAGE_KEY, UserId, state_key};
use crate::slice::StateSlice;
use crate::store::StateStore;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use strata_core::AppConfig;

/// Serialized slices injected by the server at initial load, keyed by
/// storage key. Absent keys mean only persisted/local data is used.
pub type BootstrapState = HashMap<String, Value>;

/// Computes initial in-memory state per slice.
pub struct Rehydrator {
    store: Arc<StateStore>,
    bootstrap: BootstrapState,
    boot_time: DateTime<Utc>,
    max_age: Duration,
    persistence_enabled: bool,
}

impl Rehydrator {
    pub fn new(store: Arc<StateStore>, bootstrap: BootstrapState, config: &AppConfig) -> Self {
        Self {
            store,
            bootstrap,
            boot_time: Utc::now(),
            max_age: config.max_state_age(),
            persistence_enabled: config.persistence_enabled,
        }
    }

    /// Override the process boot time, used by the bootstrap freshness
    /// check and the precedence rule. For tests and server-side callers
    /// constructed long after boot.
    pub fn with_boot_time(mut self, boot_time: DateTime<Utc>) -> Self {
        self.boot_time = boot_time;
        self
    }

    /// Legacy monolithic entry point: initial state for the root slice.
    pub fn initial_state(&self, slice: &dyn StateSlice, user: UserId) -> Option<Value> {
        self.slice_state(slice, user)
    }

    /// Initial state for one slice, or None for the slice default.
    pub fn slice_state(&self, slice: &dyn StateSlice, user: UserId) -> Option<Value> {
        // Support/impersonation sessions must never see, nor leak into,
        // another user's persisted state.
        if !self.persistence_enabled {
            return None;
        }

        let local = self.local_candidate(slice, user);
        let bootstrap = self.bootstrap_candidate(slice);

        match (bootstrap, local) {
            (Some(b), Some((l, written_at))) => {
                // Local wins only when written after this session's
                // server render; covers a background tab catching up
                // during a slow navigation.
                if written_at > self.boot_time { Some(l) } else { Some(b) }
            }
            (Some(b), None) => Some(b),
            (None, Some((l, _))) => Some(l),
            (None, None) => None,
        }
    }

    fn local_candidate(&self, slice: &dyn StateSlice, user: UserId) -> Option<(Value, DateTime<Utc>)> {
        let candidate = self.validated_local(slice, &state_key(user, slice.storage_key()));

        if candidate.is_none() && slice.storage_key() == SIGNUP_STORAGE_KEY && user != UserId::LoggedOut {
            // In-progress signup persisted before login: adopt it, minus
            // the account-creation step that a live session obsoletes.
            return self
                .validated_local(slice, &state_key(UserId::LoggedOut, SIGNUP_STORAGE_KEY))
                .map(|(state, written_at)| (strip_signup_user_step(state), written_at));
        }

        candidate
    }

    fn validated_local(&self, slice: &dyn StateSlice, key: &str) -> Option<(Value, DateTime<Utc>)> {
        let record = self.store.get(key)?;

        // A record with no timestamp is maximally stale: never decoded.
        let written_at = record.written_at()?;

        if Utc::now() - written_at > self.max_age {
            tracing::debug!(key, "persisted record over max age, ignoring");
            return None;
        }

        match slice.deserialize(&record.state) {
            Ok(state) => Some((state, written_at)),
            Err(err) => {
                tracing::warn!(key, error = %err, "persisted record failed to decode, ignoring");
                None
            }
        }
    }

    fn bootstrap_candidate(&self, slice: &dyn StateSlice) -> Option<Value> {
        let raw = self.bootstrap.get(slice.storage_key())?;

        // Server-injected state carries no page-level timestamp; its age
        // is the process's own.
        if Utc::now() - self.boot_time > self.max_age {
            tracing::debug!(storage_key = slice.storage_key(), "bootstrap state over max age, ignoring");
            return None;
        }

        match slice.deserialize(raw) {
            Ok(state) => Some(state),
            Err(err) => {
                tracing::warn!(
                    storage_key = slice.storage_key(),
                    error = %err,
                    "bootstrap state failed to decode, ignoring"
                );
                None
            }
        }
    }
}

fn strip_signup_user_step(mut state: Value) -> Value {
    if let Some(progress) = state.get_mut("progress").and_then(|p| p.as_object_mut()) {
        progress.remove("user");
    }
    state
}
