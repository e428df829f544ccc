//! Listener registry shared by the composite store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// A change listener. Listeners re-read the snapshot; they receive no payload.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Notification hook handed to each sub-store.
pub type Notify = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Listener)>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Listener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: u64) {
        self.entries.lock().retain(|(entry_id, _)| *entry_id != id);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Call every listener registered at the time of the call.
    ///
    /// The lock is released before any listener runs, so listeners may
    /// subscribe, unsubscribe or trigger further notifications.
    pub(crate) fn notify(&self) {
        let current: Vec<Listener> = self
            .entries
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in current {
            listener();
        }
    }
}

/// Handle returned by `subscribe`.
#[must_use = "dropping a Subscription keeps the listener registered; call unsubscribe() to remove it"]
pub struct Subscription {
    id: u64,
    listeners: std::sync::Weak<Listeners>,
}

impl Subscription {
    pub(crate) fn new(id: u64, listeners: &Arc<Listeners>) -> Self {
        Self {
            id,
            listeners: Arc::downgrade(listeners),
        }
    }

    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let listeners = Arc::new(Listeners::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let id = listeners.add(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let subscription = Subscription::new(id, &listeners);

        listeners.notify();
        subscription.unsubscribe();
        listeners.notify();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(listeners.len(), 0);
    }

    #[test]
    fn test_listener_may_subscribe_during_notify() {
        let listeners = Arc::new(Listeners::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let registry = Arc::downgrade(&listeners);
        let counter = calls.clone();
        listeners.add(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(registry) = registry.upgrade() {
                registry.add(Arc::new(|| {}));
            }
        }));

        listeners.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(listeners.len(), 2);
    }
}
