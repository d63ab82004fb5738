//! Synchronous broadcast channels
//!
//! Used for the store refresh signal and for language changes. Listeners run
//! on the notifying thread, in subscription order, and all of them finish
//! before `notify` returns.

use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle returned by [`Observers::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct Observers<T: ?Sized> {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn Fn(&T) + Send + Sync>)>>,
}

impl<T: ?Sized> Observers<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns false if the id was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    pub fn notify(&self, value: &T) {
        // Snapshot so listeners may (un)subscribe without deadlocking.
        let listeners: Vec<Arc<dyn Fn(&T) + Send + Sync>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(value);
        }
    }
}

impl<T: ?Sized> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> std::fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("listeners", &self.len())
            .finish()
    }
}
