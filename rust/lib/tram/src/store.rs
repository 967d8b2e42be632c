use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde_json::Value;

use crate::dom::{Event, EventHandler};
use crate::error::{Result, TramError};
use crate::value::{Action, StateTree, SubscriptionId};

/// Pure transition for one slice of the state tree.
///
/// Must return its input unchanged for actions it does not handle.
pub type Reducer = Arc<dyn Fn(&Value, &Action) -> Value + Send + Sync>;

/// Callback run with the new snapshot after every dispatch.
pub type Listener = Arc<dyn Fn(&StateTree) -> Result<()> + Send + Sync>;

/// Reducer-driven state container.
///
/// - `dispatch(action)` runs every reducer on its own slice, swaps in the
///   resulting tree, then notifies subscribers in subscription order.
/// - `get_state()` returns the current snapshot (Arc clone, cheap).
/// - `subscribe(listener)` / `unsubscribe(id)` manage listeners.
///
/// The set of reducer keys is fixed at construction. No lock is held while
/// reducers or listeners run; a reducer that dispatches is rejected with
/// [`TramError::ReentrantDispatch`].
pub struct StateStore {
    reducers: BTreeMap<String, Reducer>,
    state: RwLock<StateTree>,
    listeners: RwLock<Vec<ListenerEntry>>,
    next_id: AtomicU64,
    reducing: AtomicBool,
}

#[derive(Clone)]
struct ListenerEntry {
    id: SubscriptionId,
    listener: Listener,
}

impl StateStore {
    /// Build a store from reducers and an initial tree.
    ///
    /// The store's tree holds exactly the reducer keys: slices of `initial`
    /// without a reducer are dropped, and reducers without a slice start at
    /// `null`.
    pub fn new(reducers: BTreeMap<String, Reducer>, initial: &StateTree) -> Arc<Self> {
        let state: StateTree = reducers
            .keys()
            .map(|key| (key.clone(), initial.get(key).cloned().unwrap_or(Value::Null)))
            .collect();
        tracing::debug!(reducers = reducers.len(), "state store created");
        Arc::new(Self {
            reducers,
            state: RwLock::new(state),
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            reducing: AtomicBool::new(false),
        })
    }

    /// Current snapshot.
    pub fn get_state(&self) -> StateTree {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reducer keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.reducers.keys().map(String::as_str)
    }

    /// Apply `action` and notify every subscriber with the new tree.
    ///
    /// Every listener runs even if an earlier one fails; failures are
    /// logged and the first is returned.
    pub fn dispatch(&self, action: &Action) -> Result<StateTree> {
        if self.reducing.swap(true, Ordering::AcqRel) {
            tracing::warn!(action = %action.kind, "dispatch rejected while reducing");
            return Err(TramError::ReentrantDispatch);
        }

        let next: StateTree = {
            let _guard = ReducingGuard(&self.reducing);
            let current = self.get_state();
            self.reducers
                .iter()
                .map(|(key, reduce)| {
                    let slice = current.get(key).unwrap_or(&Value::Null);
                    (key.clone(), reduce(slice, action))
                })
                .collect()
        };

        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        tracing::debug!(action = %action.kind, "state updated");

        // Snapshot listeners so callbacks may subscribe or unsubscribe.
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut first_err = None;
        for entry in &listeners {
            if let Err(err) = (entry.listener)(&next) {
                tracing::error!(subscription = entry.id.0, error = %err, "state listener failed");
                first_err.get_or_insert(err);
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(next),
        }
    }

    /// Register a listener, called after every dispatch.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&StateTree) -> Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ListenerEntry {
                id,
                listener: Arc::new(listener),
            });
        id
    }

    /// Remove a listener. Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|entry| entry.id != id);
        listeners.len() != before
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// A weak dispatch handle for pages and event handlers.
    pub fn dispatcher(self: &Arc<Self>) -> Dispatcher {
        Dispatcher {
            store: Arc::downgrade(self),
        }
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("reducers", &self.reducers.keys().collect::<Vec<_>>())
            .field("state", &self.get_state())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Clears the reentrancy flag even if a reducer panics.
struct ReducingGuard<'a>(&'a AtomicBool);

impl Drop for ReducingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────

/// Cloneable handle that dispatches into a store without keeping it alive.
#[derive(Clone)]
pub struct Dispatcher {
    store: Weak<StateStore>,
}

impl Dispatcher {
    /// Dispatch through the store, or fail with
    /// [`TramError::StoreDropped`].
    pub fn dispatch(&self, action: &Action) -> Result<StateTree> {
        let store = self.store.upgrade().ok_or(TramError::StoreDropped)?;
        store.dispatch(action)
    }

    /// Event handler that dispatches `action` on every event.
    ///
    /// Handlers cannot return errors, so failures are logged.
    pub fn handler(&self, action: Action) -> EventHandler {
        let dispatcher = self.clone();
        Arc::new(move |event: &Event| {
            if let Err(err) = dispatcher.dispatch(&action) {
                tracing::warn!(action = %action.kind, event = %event.kind, error = %err, "dispatch from event failed");
            }
        })
    }

    /// Check whether the store is still alive.
    pub fn is_live(&self) -> bool {
        self.store.strong_count() > 0
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("live", &self.is_live())
            .finish()
    }
}
