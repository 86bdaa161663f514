//! State persistence and rehydration.
//!
//! Reconciles three competing sources of application state — server
//! bootstrap data, locally persisted records, and the live store — with
//! freshness-based precedence, across a modular set of slices each
//! owning a named storage key.
//!
//! Boot sequence:
//! 1. `StateStore::load` once, before anything reads persisted state
//! 2. `Rehydrator` computes each slice's initial state
//! 3. `persist_on_change` watches the live store and writes back,
//!    throttled, for the rest of the session
//!
//! Persistence is an optimization layer. Every storage and decode
//! failure inside this crate degrades to "data absent": the worst case
//! of a total persistence failure is a cold start, never a crash.

pub mod dev;
pub mod keys;
pub mod rehydrate;
pub mod scheduler;
pub mod slice;
pub mod store;

pub use dev::apply_development_behavior;
pub use keys::{ROOT_STORAGE_KEY, SIGNUP_STORAGE_KEY, UserId, state_key};
pub use rehydrate::{BootstrapState, Rehydrator};
pub use scheduler::{AppState, PersistenceHandle, persist_on_change};
pub use slice::{JsonSlice, SliceError, SliceRegistry, StateSlice};
pub use store::StateStore;
