//! Change-driven persistence with a trailing-edge throttle.
//!
//! Watches the live store and serializes state back to the persisted
//! store at most once per throttle window. The throttle is trailing-edge
//! only: a burst of changes collapses into a single write carrying the
//! last state, and nothing is written at the leading edge. A separate
//! immediate flush path exists for teardown, where a pending timer would
//! otherwise drop the final change.

use crate::keys::{UserId, state_key};
use crate::slice::SliceRegistry;
use crate::store::StateStore;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strata_core::{AppConfig, StorageRecord};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

/// Live application state: one JSON value per storage key.
///
/// Updates replace the whole map, so an unchanged Arc means unchanged
/// state and lets the scheduler short-circuit on reference identity.
pub type AppState = Arc<HashMap<String, Value>>;

enum Command {
    FlushNow(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle over a running persistence subscription.
///
/// Dropping the handle detaches the background task, which keeps
/// flushing until the watched store goes away; `unsubscribe` stops it
/// after one final flush.
pub struct PersistenceHandle {
    commands: Option<mpsc::Sender<Command>>,
    task: Option<JoinHandle<()>>,
}

impl PersistenceHandle {
    fn disabled() -> Self {
        Self { commands: None, task: None }
    }

    /// Whether this handle drives a live subscription.
    pub fn is_active(&self) -> bool {
        self.commands.is_some()
    }

    /// Flush the current state immediately, bypassing the throttle.
    ///
    /// The teardown path: the trailing-edge timer may still be pending
    /// when the session ends, and this makes sure the last state change
    /// is attempted before then.
    pub async fn flush_now(&self) {
        let Some(commands) = &self.commands else { return };
        let (done, waited) = oneshot::channel();
        if commands.send(Command::FlushNow(done)).await.is_ok() {
            let _ = waited.await;
        }
    }

    /// Stop watching after one final immediate flush.
    pub async fn unsubscribe(mut self) {
        if let Some(commands) = self.commands.take() {
            let (done, waited) = oneshot::channel();
            if commands.send(Command::Shutdown(done)).await.is_ok() {
                let _ = waited.await;
            }
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Watch the live store and persist serialized state on change.
///
/// Returns a no-op handle when persistence is disabled for the session.
pub fn persist_on_change(
    states: watch::Receiver<AppState>, store: Arc<StateStore>, registry: Arc<SliceRegistry>, user: UserId,
    config: &AppConfig,
) -> PersistenceHandle {
    if !config.persistence_enabled {
        return PersistenceHandle::disabled();
    }

    let (commands, command_rx) = mpsc::channel(4);
    let flusher = Flusher { store, registry, user };
    let task = tokio::spawn(run(states, command_rx, flusher, config.flush_interval()));

    PersistenceHandle { commands: Some(commands), task: Some(task) }
}

async fn run(
    mut states: watch::Receiver<AppState>, mut commands: mpsc::Receiver<Command>, flusher: Flusher, window: Duration,
) {
    let mut deadline: Option<Instant> = None;
    let mut last_flushed: Option<AppState> = None;
    let mut commands_open = true;

    loop {
        let armed = deadline;
        let timer = async move {
            match armed {
                Some(at) => sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            changed = states.changed() => match changed {
                // The first change of a burst arms the timer; later ones
                // ride along and the flush picks up whatever is latest.
                Ok(()) => {
                    if deadline.is_none() {
                        deadline = Some(Instant::now() + window);
                    }
                }
                // Watched store dropped: final flush, then stop.
                Err(_) => {
                    flusher.flush_latest(&mut states, &mut last_flushed).await;
                    return;
                }
            },
            _ = timer => {
                deadline = None;
                flusher.flush_latest(&mut states, &mut last_flushed).await;
            }
            command = commands.recv(), if commands_open => match command {
                Some(Command::FlushNow(done)) => {
                    deadline = None;
                    flusher.flush_latest(&mut states, &mut last_flushed).await;
                    let _ = done.send(());
                }
                Some(Command::Shutdown(done)) => {
                    flusher.flush_latest(&mut states, &mut last_flushed).await;
                    let _ = done.send(());
                    return;
                }
                None => commands_open = false,
            }
        }
    }
}

struct Flusher {
    store: Arc<StateStore>,
    registry: Arc<SliceRegistry>,
    user: UserId,
}

impl Flusher {
    async fn flush_latest(&self, states: &mut watch::Receiver<AppState>, last_flushed: &mut Option<AppState>) {
        let state = states.borrow_and_update().clone();

        // Same reference as the previous flush means nothing changed.
        if last_flushed.as_ref().is_some_and(|prev| Arc::ptr_eq(prev, &state)) {
            return;
        }

        self.flush(&state).await;
        *last_flushed = Some(state);
    }

    /// Serialize every registered slice and write its record, all
    /// stamped with the same timestamp. Failures are isolated per
    /// slice: logged, not retried, siblings unaffected.
    async fn flush(&self, state: &AppState) {
        let timestamp = Utc::now().timestamp_millis();

        for slice in self.registry.iter() {
            let Some(live) = state.get(slice.storage_key()) else { continue };

            let payload = match slice.serialize(live) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(
                        storage_key = slice.storage_key(),
                        error = %err,
                        "failed to serialize slice, skipping"
                    );
                    continue;
                }
            };

            let key = state_key(self.user, slice.storage_key());
            let record = StorageRecord::with_timestamp(payload, timestamp);
            if let Err(err) = self.store.set(&key, record).await {
                tracing::warn!(%key, error = %err, "failed to persist slice");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::JsonSlice;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use strata_core::{Error, MemoryBackend, StorageBackend};

    /// Backend wrapper counting `set` calls.
    struct CountingBackend {
        inner: MemoryBackend,
        writes: AtomicUsize,
    }

    impl CountingBackend {
        fn new() -> Self {
            Self { inner: MemoryBackend::new(), writes: AtomicUsize::new(0) }
        }

        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StorageBackend for CountingBackend {
        async fn get_all(&self, prefixes: &[&str]) -> Result<HashMap<String, Value>, Error> {
            self.inner.get_all(prefixes).await
        }

        async fn get(&self, key: &str) -> Result<Option<Value>, Error> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> Result<(), Error> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value).await
        }

        async fn remove_all(&self) -> Result<(), Error> {
            self.inner.remove_all().await
        }
    }

    /// Backend that fails writes to one specific key.
    struct FailingKeyBackend {
        inner: MemoryBackend,
        poisoned_key: String,
    }

    #[async_trait]
    impl StorageBackend for FailingKeyBackend {
        async fn get_all(&self, prefixes: &[&str]) -> Result<HashMap<String, Value>, Error> {
            self.inner.get_all(prefixes).await
        }

        async fn get(&self, key: &str) -> Result<Option<Value>, Error> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> Result<(), Error> {
            if key == self.poisoned_key {
                return Err(Error::Storage("quota exceeded".into()));
            }
            self.inner.set(key, value).await
        }

        async fn remove_all(&self) -> Result<(), Error> {
            self.inner.remove_all().await
        }
    }

    fn app_state(slices: &[(&str, Value)]) -> AppState {
        Arc::new(slices.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    fn registry(keys: &[&str]) -> Arc<SliceRegistry> {
        let mut registry = SliceRegistry::new();
        for key in keys {
            registry.register(Arc::new(JsonSlice::new(*key))).unwrap();
        }
        Arc::new(registry)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_one_flush() {
        let backend = Arc::new(CountingBackend::new());
        let store = Arc::new(StateStore::new(backend.clone()));
        let (updates, states) = watch::channel(app_state(&[("prefs", json!({"v": 0}))]));

        let handle = persist_on_change(states, store.clone(), registry(&["prefs"]), UserId::LoggedIn(42), &AppConfig::default());

        for v in 1..=5 {
            updates.send(app_state(&[("prefs", json!({"v": v}))])).unwrap();
        }

        tokio::time::sleep(Duration::from_millis(5_100)).await;

        assert_eq!(backend.writes(), 1);
        let record = store.get("redux-state-42:prefs").unwrap();
        assert_eq!(record.state, json!({"v": 5}));

        handle.unsubscribe().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_leading_edge_flush() {
        let backend = Arc::new(CountingBackend::new());
        let store = Arc::new(StateStore::new(backend.clone()));
        let (updates, states) = watch::channel(app_state(&[("prefs", json!({"v": 0}))]));

        let handle = persist_on_change(states, store, registry(&["prefs"]), UserId::LoggedIn(42), &AppConfig::default());
        updates.send(app_state(&[("prefs", json!({"v": 1}))])).unwrap();

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(backend.writes(), 0);

        tokio::time::sleep(Duration::from_millis(4_200)).await;
        assert_eq!(backend.writes(), 1);

        handle.unsubscribe().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_now_bypasses_throttle() {
        let backend = Arc::new(CountingBackend::new());
        let store = Arc::new(StateStore::new(backend.clone()));
        let (updates, states) = watch::channel(app_state(&[("prefs", json!({"v": 0}))]));

        let handle = persist_on_change(states, store.clone(), registry(&["prefs"]), UserId::LoggedIn(42), &AppConfig::default());
        updates.send(app_state(&[("prefs", json!({"v": 9}))])).unwrap();

        handle.flush_now().await;
        assert_eq!(backend.writes(), 1);
        assert_eq!(store.get("redux-state-42:prefs").unwrap().state, json!({"v": 9}));

        handle.unsubscribe().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_reference_short_circuits() {
        let backend = Arc::new(CountingBackend::new());
        let store = Arc::new(StateStore::new(backend.clone()));
        let (_updates, states) = watch::channel(app_state(&[("prefs", json!({"v": 0}))]));

        let handle = persist_on_change(states, store, registry(&["prefs"]), UserId::LoggedIn(42), &AppConfig::default());

        handle.flush_now().await;
        handle.flush_now().await;
        assert_eq!(backend.writes(), 1);

        handle.unsubscribe().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_flushes_final_state() {
        let backend = Arc::new(CountingBackend::new());
        let store = Arc::new(StateStore::new(backend.clone()));
        let (updates, states) = watch::channel(app_state(&[("prefs", json!({"v": 0}))]));

        let handle = persist_on_change(states, store.clone(), registry(&["prefs"]), UserId::LoggedIn(42), &AppConfig::default());
        updates.send(app_state(&[("prefs", json!({"v": 7}))])).unwrap();

        // The timer is still pending; unsubscribe must not drop the change.
        handle.unsubscribe().await;
        assert_eq!(store.get("redux-state-42:prefs").unwrap().state, json!({"v": 7}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slices_share_one_timestamp_and_fail_independently() {
        let backend = Arc::new(FailingKeyBackend {
            inner: MemoryBackend::new(),
            poisoned_key: "redux-state-42:broken".to_string(),
        });
        let store = Arc::new(StateStore::new(backend));
        let (updates, states) = watch::channel(app_state(&[]));

        let handle = persist_on_change(
            states,
            store.clone(),
            registry(&["prefs", "broken", "sites"]),
            UserId::LoggedIn(42),
            &AppConfig::default(),
        );
        updates
            .send(app_state(&[
                ("prefs", json!({"p": 1})),
                ("broken", json!({"b": 2})),
                ("sites", json!({"s": 3})),
            ]))
            .unwrap();

        handle.flush_now().await;

        let prefs = store.get("redux-state-42:prefs").unwrap();
        let sites = store.get("redux-state-42:sites").unwrap();
        assert!(store.get("redux-state-42:broken").is_none());
        assert_eq!(prefs.timestamp, sites.timestamp);

        handle.unsubscribe().await;
    }

    #[tokio::test]
    async fn test_disabled_returns_noop_handle() {
        let backend = Arc::new(CountingBackend::new());
        let store = Arc::new(StateStore::new(backend.clone()));
        let (updates, states) = watch::channel(app_state(&[("prefs", json!({"v": 0}))]));

        let config = AppConfig { persistence_enabled: false, ..Default::default() };
        let handle = persist_on_change(states, store, registry(&["prefs"]), UserId::LoggedIn(42), &config);

        assert!(!handle.is_active());
        updates.send(app_state(&[("prefs", json!({"v": 1}))])).unwrap();
        handle.flush_now().await;
        assert_eq!(backend.writes(), 0);

        handle.unsubscribe().await;
    }
}
