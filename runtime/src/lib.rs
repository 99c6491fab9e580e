//! # Festival Runtime
//!
//! The Store runtime for the checkout engine.
//!
//! The Store owns the checkout state, runs the reducer for every action and
//! interprets the effects the reducer returns:
//!
//! - `Future` effects are spawned and their resulting action is fed back in
//! - `Debounce` effects dispatch their action after a quiet period
//! - `Debounce` effects sharing a key replace each other, so a burst of
//!   triggers yields a single action
//!
//! ## Example
//!
//! ```ignore
//! use festival_runtime::Store;
//!
//! let store = Store::new(CheckoutState::default(), CheckoutReducer::new(), env);
//!
//! let mut handle = store.send(CheckoutAction::ToggleItem { item }).await?;
//! handle.wait().await;
//!
//! let step = store.state(|s| s.step).await;
//! ```

use festival_core::{
    effect::{Effect, EffectKey},
    reducer::Reducer,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{RwLock, broadcast, watch};
use tokio::task::AbortHandle;

/// Retry logic with exponential backoff
pub mod retry;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for an action or for effects to settle
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast channel closed
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;
pub use store::Store;

/// Completion tracking shared by every effect started from one `send`.
///
/// Actions fed back from effects are dispatched with the same tracking, so
/// an [`EffectHandle`] waits for the whole cascade (e.g. registration, then
/// order creation, then the document upload it triggers).
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn new() -> (Self, EffectHandle) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());
        (
            Self {
                counter: Arc::clone(&counter),
                notifier: Arc::new(tx),
            },
            EffectHandle { counter, done: rx },
        )
    }

    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Decrements the tracking counter when an effect task ends, including when
/// the task is aborted (superseded debounce) or panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        if self.0.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.notifier.send_replace(());
        }
    }
}

struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle returned by [`Store::send`] for waiting on the effects it started.
pub struct EffectHandle {
    counter: Arc<AtomicUsize>,
    done: watch::Receiver<()>,
}

impl EffectHandle {
    /// Wait until every effect started by the originating action, and every
    /// effect started by actions those effects fed back, has finished.
    pub async fn wait(&mut self) {
        loop {
            self.done.borrow_and_update();
            if self.counter.load(Ordering::SeqCst) == 0 {
                return;
            }
            if self.done.changed().await.is_err() {
                return;
            }
        }
    }

    /// Like [`EffectHandle::wait`] but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if effects are still running when the
    /// timeout elapses.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }

    /// Number of effects still running
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Store implementation
pub mod store {
    use super::{
        AbortHandle, Arc, AtomicBool, AtomicCounterGuard, AtomicU64, AtomicUsize, DecrementGuard,
        Duration, Effect, EffectHandle, EffectKey, EffectTracking, HashMap, Mutex, MutexGuard,
        Ordering, PoisonError, Reducer, RwLock, StoreError, broadcast,
    };

    struct Inner<S, A, E, R> {
        state: RwLock<S>,
        reducer: R,
        environment: E,
        shutdown: AtomicBool,
        pending_effects: Arc<AtomicUsize>,
        debounced: Mutex<HashMap<EffectKey, (u64, AbortHandle)>>,
        debounce_seq: AtomicU64,
        action_broadcast: broadcast::Sender<A>,
    }

    /// The Store - runtime coordinator for a reducer
    ///
    /// Holds state behind an `RwLock`, serialises reducer calls (one action
    /// at a time) and executes effects on the tokio runtime. Cloning a Store
    /// is cheap and yields another handle to the same state.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        inner: Arc<Inner<S, A, E, R>>,
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
            }
        }
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + std::fmt::Debug + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(initial_state, reducer, environment, 64)
        }

        /// Create a store whose action broadcast channel holds `capacity`
        /// actions before slow observers start lagging.
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));
            Self {
                inner: Arc::new(Inner {
                    state: RwLock::new(initial_state),
                    reducer,
                    environment,
                    shutdown: AtomicBool::new(false),
                    pending_effects: Arc::new(AtomicUsize::new(0)),
                    debounced: Mutex::new(HashMap::new()),
                    debounce_seq: AtomicU64::new(0),
                    action_broadcast,
                }),
            }
        }

        /// Send an action to the store
        ///
        /// Runs the reducer under the state write lock, then starts the
        /// returned effects. Returns as soon as the effects are started; use
        /// the returned handle to wait for them.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.inner.shutdown.load(Ordering::SeqCst) {
                tracing::warn!("Rejected action: store is shutting down");
                return Err(StoreError::ShutdownInProgress);
            }

            let (tracking, handle) = EffectTracking::new();
            self.dispatch(action, &tracking).await;
            Ok(handle)
        }

        /// Send an action and wait for an action produced by its effects
        /// that matches `predicate`.
        ///
        /// Subscribes before sending so a fast effect cannot be missed.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: no matching action before `timeout`
        /// - [`StoreError::ChannelClosed`]: the broadcast channel closed
        /// - [`StoreError::ShutdownInProgress`]: the store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool,
        {
            let mut rx = self.subscribe_actions();
            self.send(action).await?;

            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {},
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            })
            .await
            .map_err(|_| StoreError::Timeout)?
        }

        /// Subscribe to actions fed back by effects
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.inner.action_broadcast.subscribe()
        }

        /// Read state through a closure
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.inner.state.read().await;
            f(&state)
        }

        /// Number of effects currently running across all handles
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.inner.pending_effects.load(Ordering::SeqCst)
        }

        /// Stop accepting new actions and wait for running effects to drain.
        ///
        /// Effects already in flight still feed their actions back, so a
        /// pending draft autosave gets written before the store goes away.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if effects are still
        /// running after `timeout`.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            self.inner.shutdown.store(true, Ordering::SeqCst);
            tracing::info!(pending = self.pending_effects(), "Store shutdown initiated");

            let drained = tokio::time::timeout(timeout, async {
                while self.pending_effects() > 0 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await;

            match drained {
                Ok(()) => {
                    tracing::info!("Store shutdown complete");
                    Ok(())
                },
                Err(_) => {
                    let remaining = self.pending_effects();
                    tracing::warn!(remaining, "Store shutdown timed out");
                    Err(StoreError::ShutdownTimeout(remaining))
                },
            }
        }

        async fn dispatch(&self, action: A, tracking: &EffectTracking) {
            let effects = {
                let mut state = self.inner.state.write().await;
                self.inner
                    .reducer
                    .reduce(&mut state, action, &self.inner.environment)
            };

            for effect in effects {
                self.execute(effect, tracking.clone());
            }
        }

        async fn feed_back(&self, action: A, tracking: &EffectTracking) {
            tracing::trace!(?action, "Effect produced an action");
            let _ = self.inner.action_broadcast.send(action.clone());
            self.dispatch(action, tracking).await;
        }

        fn debounced_slots(&self) -> MutexGuard<'_, HashMap<EffectKey, (u64, AbortHandle)>> {
            self.inner
                .debounced
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
        }

        fn track_pending(&self) -> AtomicCounterGuard {
            self.inner.pending_effects.fetch_add(1, Ordering::SeqCst);
            AtomicCounterGuard(Arc::clone(&self.inner.pending_effects))
        }

        #[allow(clippy::needless_pass_by_value)] // tracking is cloned into spawned tasks
        fn execute(&self, effect: Effect<A>, tracking: EffectTracking) {
            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    tracking.increment();
                    let pending = self.track_pending();
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = DecrementGuard(tracking.clone());
                        let _pending = pending;

                        if let Some(action) = fut.await {
                            store.feed_back(action, &tracking).await;
                        }
                    });
                },
                Effect::Debounce {
                    key,
                    duration,
                    action,
                } => {
                    metrics::counter!("store.effects.executed", "type" => "debounce").increment(1);
                    tracking.increment();
                    let pending = self.track_pending();
                    let id = self.inner.debounce_seq.fetch_add(1, Ordering::SeqCst);
                    let store = self.clone();

                    let task = tokio::spawn(async move {
                        let _guard = DecrementGuard(tracking.clone());
                        let _pending = pending;

                        tokio::time::sleep(duration).await;
                        {
                            let mut slots = store.debounced_slots();
                            if slots.get(&key).is_some_and(|(slot_id, _)| *slot_id == id) {
                                slots.remove(&key);
                            }
                        }
                        tracing::debug!(%key, "Debounced action firing");
                        store.feed_back(*action, &tracking).await;
                    });

                    if let Some((_, previous)) =
                        self.debounced_slots().insert(key, (id, task.abort_handle()))
                    {
                        tracing::trace!(%key, "Superseding pending debounced action");
                        previous.abort();
                    }
                },
                Effect::Cancel(key) => {
                    metrics::counter!("store.effects.executed", "type" => "cancel").increment(1);
                    if let Some((_, handle)) = self.debounced_slots().remove(&key) {
                        tracing::debug!(%key, "Cancelled pending debounced action");
                        handle.abort();
                    }
                },
            }
        }
    }
}
