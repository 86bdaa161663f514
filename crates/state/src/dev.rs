//! Development-mode persisted state clearing.
//!
//! Developers who never cold-start stop noticing how the cold-start path
//! behaves. The `randomly-clear` behavior wipes persisted state for a
//! fraction of sessions; `force-clear` wipes it every session. The
//! decision is made once, here, at startup; the rehydration path never
//! branches on the environment.

use crate::store::StateStore;
use rand::Rng;
use strata_core::{DevelopmentBehavior, Error};

/// Chance that `RandomlyClear` wipes this session's persisted state.
const RANDOM_CLEAR_PROBABILITY: f64 = 0.25;

/// Apply the configured development behavior, once, at startup.
///
/// Returns whether the store was cleared. Clearing also sets the flag
/// that marks the wipe as intentional, so later reads don't mistake the
/// empty store for corruption.
pub async fn apply_development_behavior(store: &StateStore, behavior: DevelopmentBehavior) -> Result<bool, Error> {
    let clear = match behavior {
        DevelopmentBehavior::Normal => false,
        DevelopmentBehavior::ForceClear => true,
        DevelopmentBehavior::RandomlyClear => rand::thread_rng().gen_bool(RANDOM_CLEAR_PROBABILITY),
    };

    if !clear {
        return Ok(false);
    }

    store.clear().await?;
    store.set_cleared_flag().await?;
    tracing::info!("cleared persisted state for this development session");
    Ok(true)
}
