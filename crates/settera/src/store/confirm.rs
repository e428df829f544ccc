//! Single-slot confirmation requests.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::notifier::Notify;
use crate::schema::ConfirmConfig;

pub type Continuation = Box<dyn FnOnce() + Send>;

/// A confirmation request awaiting the user.
pub struct PendingConfirm {
    pub key: String,
    pub config: ConfirmConfig,
    pub dangerous: bool,
    pub on_confirm: Continuation,
    pub on_cancel: Continuation,
}

impl PendingConfirm {
    pub fn new(
        key: impl Into<String>,
        config: ConfirmConfig,
        on_confirm: impl FnOnce() + Send + 'static,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            config,
            dangerous: false,
            on_confirm: Box::new(on_confirm),
            on_cancel: Box::new(on_cancel),
        }
    }

    pub fn dangerous(mut self, dangerous: bool) -> Self {
        self.dangerous = dangerous;
        self
    }
}

/// Read-only view of the pending request, as exposed in snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmRequest {
    pub key: String,
    pub config: ConfirmConfig,
    pub dangerous: bool,
}

/// What `resolve_confirm` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    Cancelled,
    /// The entered text did not match `require_text`; the request is still pending.
    TextMismatch,
    NothingPending,
}

struct Slot {
    request: Arc<ConfirmRequest>,
    on_confirm: Continuation,
    on_cancel: Continuation,
}

impl From<PendingConfirm> for Slot {
    fn from(pending: PendingConfirm) -> Self {
        Self {
            request: Arc::new(ConfirmRequest {
                key: pending.key,
                config: pending.config,
                dangerous: pending.dangerous,
            }),
            on_confirm: pending.on_confirm,
            on_cancel: pending.on_cancel,
        }
    }
}

pub struct ConfirmManager {
    slot: Mutex<Option<Slot>>,
    notify: Notify,
}

impl ConfirmManager {
    pub fn new(notify: Notify) -> Self {
        Self {
            slot: Mutex::new(None),
            notify,
        }
    }

    /// Install `pending`, cancelling whatever request it replaces.
    pub fn request_confirm(&self, pending: PendingConfirm) {
        let previous = self.slot.lock().take();
        if let Some(previous) = previous {
            debug!("replacing pending confirm for {:?}", previous.request.key);
            (previous.on_cancel)();
        }

        // A cancel continuation may itself have installed a request.
        let displaced = self.slot.lock().replace(Slot::from(pending));
        if let Some(displaced) = displaced {
            (displaced.on_cancel)();
        }
        (self.notify)();
    }

    /// Confirm or cancel the pending request.
    ///
    /// Confirming is gated on `entered_text` matching `require_text` exactly.
    /// Cancelling is never gated.
    pub fn resolve_confirm(&self, confirmed: bool, entered_text: Option<&str>) -> ConfirmOutcome {
        let slot = {
            let mut guard = self.slot.lock();
            let Some(current) = guard.as_ref() else {
                return ConfirmOutcome::NothingPending;
            };
            if confirmed
                && let Some(required) = &current.request.config.require_text
                && entered_text != Some(required.as_str())
            {
                debug!("confirm text mismatch for {:?}", current.request.key);
                return ConfirmOutcome::TextMismatch;
            }
            match guard.take() {
                Some(slot) => slot,
                None => return ConfirmOutcome::NothingPending,
            }
        };

        let outcome = if confirmed {
            (slot.on_confirm)();
            ConfirmOutcome::Confirmed
        } else {
            (slot.on_cancel)();
            ConfirmOutcome::Cancelled
        };
        (self.notify)();
        outcome
    }

    pub fn pending_confirm(&self) -> Option<Arc<ConfirmRequest>> {
        self.slot.lock().as_ref().map(|slot| slot.request.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tally {
        confirmed: AtomicUsize,
        cancelled: AtomicUsize,
    }

    fn manager() -> (ConfirmManager, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let manager = ConfirmManager::new(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        (manager, calls)
    }

    fn pending(key: &str, require_text: Option<&str>, tally: &Arc<Tally>) -> PendingConfirm {
        let on_confirm = tally.clone();
        let on_cancel = tally.clone();
        PendingConfirm::new(
            key,
            ConfirmConfig {
                title: "Are you sure?".to_string(),
                require_text: require_text.map(str::to_string),
                ..ConfirmConfig::default()
            },
            move || {
                on_confirm.confirmed.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                on_cancel.cancelled.fetch_add(1, Ordering::SeqCst);
            },
        )
    }

    #[test]
    fn test_require_text_gates_confirmation() {
        let (manager, calls) = manager();
        let tally = Arc::new(Tally::default());
        manager.request_confirm(pending("wipe", Some("DELETE"), &tally));

        assert_eq!(manager.resolve_confirm(true, Some("delete")), ConfirmOutcome::TextMismatch);
        assert!(manager.pending_confirm().is_some());
        assert_eq!(tally.confirmed.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(manager.resolve_confirm(true, None), ConfirmOutcome::TextMismatch);

        assert_eq!(manager.resolve_confirm(true, Some("DELETE")), ConfirmOutcome::Confirmed);
        assert!(manager.pending_confirm().is_none());
        assert_eq!(tally.confirmed.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancel_ignores_require_text() {
        let (manager, _) = manager();
        let tally = Arc::new(Tally::default());
        manager.request_confirm(pending("wipe", Some("DELETE"), &tally));

        assert_eq!(manager.resolve_confirm(false, Some("anything")), ConfirmOutcome::Cancelled);
        assert!(manager.pending_confirm().is_none());
        assert_eq!(tally.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(tally.confirmed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_new_request_cancels_previous() {
        let (manager, _) = manager();
        let first = Arc::new(Tally::default());
        let second = Arc::new(Tally::default());

        manager.request_confirm(pending("a", None, &first));
        manager.request_confirm(pending("b", None, &second));

        assert_eq!(first.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(manager.pending_confirm().unwrap().key, "b");

        manager.resolve_confirm(true, None);
        assert_eq!(second.confirmed.load(Ordering::SeqCst), 1);
        assert_eq!(first.confirmed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resolve_without_pending_is_noop() {
        let (manager, calls) = manager();
        assert_eq!(manager.resolve_confirm(true, None), ConfirmOutcome::NothingPending);
        assert_eq!(manager.resolve_confirm(false, None), ConfirmOutcome::NothingPending);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dangerous_flag_is_exposed() {
        let (manager, _) = manager();
        let tally = Arc::new(Tally::default());
        manager.request_confirm(pending("wipe", None, &tally).dangerous(true));
        assert!(manager.pending_confirm().unwrap().dangerous);
    }
}
