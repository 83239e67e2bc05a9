//! Observable state holder
//!
//! A small publish-on-change container. Components keep their source-of-truth
//! values (window list, active error, connection state) in an `Observable` so
//! that any number of watchers can react without polling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::debug;

type Watcher<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Shared<T> {
    value: Mutex<T>,
    watchers: Mutex<Vec<(u64, Watcher<T>)>>,
    next_id: AtomicU64,
}

/// Cloneable handle to a shared value with change notification
///
/// Clones share the same underlying value and watcher list.
pub struct Observable<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Observable<T> {
    /// Create a new observable holding `value`
    pub fn new(value: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                value: Mutex::new(value),
                watchers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Get a copy of the current value
    pub fn get(&self) -> T {
        self.value().clone()
    }

    /// Read the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value())
    }

    /// Replace the value and notify watchers
    pub fn set(&self, value: T) {
        let snapshot = {
            let mut guard = self.value();
            *guard = value;
            guard.clone()
        };
        self.notify(&snapshot);
    }

    /// Mutate the value in place and notify watchers
    ///
    /// Returns whatever the closure returns.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let (result, snapshot) = {
            let mut guard = self.value();
            let result = f(&mut guard);
            (result, guard.clone())
        };
        self.notify(&snapshot);
        result
    }

    /// Mutate the value in place, notifying watchers only if the closure
    /// reports a change
    pub fn update_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        let snapshot = {
            let mut guard = self.value();
            if !f(&mut guard) {
                return false;
            }
            guard.clone()
        };
        self.notify(&snapshot);
        true
    }

    /// Register a watcher called with the new value after every change
    ///
    /// The watcher stays registered until the returned [`Subscription`] is
    /// cancelled or dropped.
    pub fn subscribe<F>(&self, watcher: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(id, "Observable::subscribe: registering watcher");
        self.watchers().push((id, Arc::new(watcher)));

        let weak: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    let mut watchers = shared.watchers.lock().unwrap_or_else(|e| e.into_inner());
                    watchers.retain(|(wid, _)| *wid != id);
                }
            })),
        }
    }

    /// Number of registered watchers
    pub fn watcher_count(&self) -> usize {
        self.watchers().len()
    }

    fn notify(&self, value: &T) {
        let watchers: Vec<Watcher<T>> = self.watchers().iter().map(|(_, w)| Arc::clone(w)).collect();
        for watcher in watchers {
            watcher(value);
        }
    }

    fn value(&self) -> MutexGuard<'_, T> {
        self.shared.value.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn watchers(&self) -> MutexGuard<'_, Vec<(u64, Watcher<T>)>> {
        self.shared.watchers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T: Clone + Send + Default + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Handle that removes a watcher when cancelled or dropped
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Remove the watcher now
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}
