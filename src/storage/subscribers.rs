//! Change-notification fan-out shared by the typed stores

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use uuid::Uuid;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type Registry<T> = Mutex<HashMap<Uuid, Callback<T>>>;

/// Set of callbacks notified after each committed mutation
pub(crate) struct Subscribers<T> {
    callbacks: Arc<Registry<T>>,
}

impl<T> Clone for Subscribers<T> {
    fn clone(&self) -> Self {
        Self {
            callbacks: Arc::clone(&self.callbacks),
        }
    }
}

impl<T: 'static> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self {
            callbacks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        lock(&self.callbacks).insert(id, Arc::new(callback));

        let registry: Weak<Registry<T>> = Arc::downgrade(&self.callbacks);
        Subscription {
            id,
            cancel: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    lock(&registry).remove(&id);
                }
            })),
        }
    }

    /// Call every active subscriber once with `value`
    pub(crate) fn notify(&self, value: &T) {
        // Snapshot so a callback may unsubscribe without deadlocking
        let callbacks: Vec<Callback<T>> = lock(&self.callbacks).values().cloned().collect();
        for callback in callbacks {
            callback(value);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.callbacks).len()
    }
}

fn lock<T>(registry: &Registry<T>) -> std::sync::MutexGuard<'_, HashMap<Uuid, Callback<T>>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle returned by `subscribe`; dropping it keeps the subscription alive
pub struct Subscription {
    id: Uuid,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stop receiving notifications. Takes effect immediately.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
