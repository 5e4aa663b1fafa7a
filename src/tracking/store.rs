//! Push-based broadcast of the latest tracked pose.
//!
//! The frame loop (or the marker fallback) is the single writer; any number of
//! readers either take a [`TrackingState`] snapshot or subscribe a
//! zero-argument listener that is invoked synchronously on every write.
//! There is no queue: a reader that misses a notification simply reads the
//! newer snapshot next time.
//!
//! The store is an explicit handle passed to the components that need it.
//! Cloning the handle shares the same underlying record.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{trace, warn};

use crate::error::StoreError;
use crate::tracking::state::{TrackingState, TrackingUpdate};

/// Listener invoked after every store write.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Identifier of a subscribed listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

struct StoreInner {
    state: RwLock<TrackingState>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
}

impl StoreInner {
    fn remove(&self, id: ListenerId) -> Result<(), StoreError> {
        let mut listeners = self.listeners.lock();
        match listeners.iter().position(|(lid, _)| *lid == id) {
            Some(idx) => {
                listeners.remove(idx);
                Ok(())
            }
            None => Err(StoreError::UnknownListener(id)),
        }
    }
}

/// Shared handle to the tracking record and its listeners.
#[derive(Clone)]
pub struct TrackingStore {
    inner: Arc<StoreInner>,
}

impl TrackingStore {
    /// New store holding an untracked, identity state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(TrackingState::untracked()),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    /// Copy of the current state. Never observes a partially applied update.
    pub fn snapshot(&self) -> TrackingState {
        *self.inner.state.read()
    }

    /// Merge `update` into the record, then notify every listener before returning.
    pub fn update(&self, update: TrackingUpdate) {
        {
            let mut state = self.inner.state.write();
            state.apply(&update);
        }
        self.notify();
    }

    /// Reset to untracked/identity and notify.
    pub fn reset(&self) {
        *self.inner.state.write() = TrackingState::untracked();
        self.notify();
    }

    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    #[must_use = "dropping the subscription immediately removes the listener"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        trace!("tracking store: subscribed {}", id);
        Subscription {
            store: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Remove a listener by id. Unknown or already removed ids are an error.
    pub fn unsubscribe(&self, id: ListenerId) -> Result<(), StoreError> {
        self.inner.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    fn notify(&self) {
        // Listeners run outside the lock so they can read the store or drop
        // their own subscription.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

impl Default for TrackingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TrackingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingStore")
            .field("state", &self.snapshot())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Scoped listener registration returned by [`TrackingStore::subscribe`].
///
/// Dropping it removes the listener.
pub struct Subscription {
    store: Weak<StoreInner>,
    id: Option<ListenerId>,
}

impl Subscription {
    pub fn id(&self) -> Option<ListenerId> {
        self.id
    }

    /// Remove exactly this listener.
    ///
    /// Fails if the listener was already removed through
    /// [`TrackingStore::unsubscribe`]. A store that no longer exists has no
    /// listeners left to remove, which counts as success.
    pub fn unsubscribe(mut self) -> Result<(), StoreError> {
        match (self.id.take(), self.store.upgrade()) {
            (Some(id), Some(store)) => store.remove(id),
            _ => Ok(()),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let (Some(id), Some(store)) = (self.id.take(), self.store.upgrade()) {
            if let Err(e) = store.remove(id) {
                warn!("tracking store: {} on drop", e);
            }
        }
    }
}
