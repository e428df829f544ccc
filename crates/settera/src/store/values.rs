//! Composite settings store.
//!
//! Owns the value snapshot and the four stateful sub-stores behind a single
//! listener list and a single aggregated snapshot.
//!
//! Writes come in two phases. `set_values` stages new values without
//! notifying (call it while the host renders); `emit_change` rebuilds the
//! snapshot and notifies (call it afterwards). Staging several times before
//! one `emit_change` collapses into a single observed update.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tracing::debug;

use super::actions::{ActionLoadingSnapshot, ActionTracker};
use super::callbacks::{CallbackRefs, Outcome, Validation};
use super::confirm::{ConfirmManager, ConfirmOutcome, ConfirmRequest, PendingConfirm};
use super::errors::{ErrorMap, ErrorSnapshot};
use super::notifier::{Listener, Listeners, Notify, Subscription};
use super::save::{SaveStatus, SaveStatusSnapshot, SaveTracker};
use crate::config::StoreConfig;
use crate::error::{SetteraError, SetteraResult};

/// Immutable value snapshot.
pub type ValueMap = Map<String, Value>;

/// Aggregated, immutable view of the whole store.
///
/// A new instance is built on every change; an unchanged store keeps
/// returning the same `Arc`.
#[derive(Debug, Clone)]
pub struct SetteraState {
    pub values: Arc<ValueMap>,
    pub errors: ErrorSnapshot,
    pub save_status: SaveStatusSnapshot,
    pub pending_confirm: Option<Arc<ConfirmRequest>>,
    pub action_loading: ActionLoadingSnapshot,
}

impl SetteraState {
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn error(&self, key: &str) -> Option<&str> {
        self.errors.get(key).map(String::as_str)
    }

    pub fn save_status(&self, key: &str) -> SaveStatus {
        self.save_status.get(key).copied().unwrap_or_default()
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.action_loading.get(key).copied().unwrap_or(false)
    }
}

pub(crate) struct StoreInner {
    values: Mutex<Arc<ValueMap>>,
    snapshot: Mutex<Arc<SetteraState>>,
    listeners: Arc<Listeners>,
    errors: ErrorMap,
    saves: SaveTracker,
    actions: ActionTracker,
    confirms: ConfirmManager,
    callbacks: CallbackRefs,
    validations: Mutex<HashMap<String, u64>>,
    runtime: Handle,
    destroyed: AtomicBool,
}

/// The settings value store. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ValuesStore {
    inner: Arc<StoreInner>,
}

impl ValuesStore {
    /// Create an empty store.
    ///
    /// Must be called inside a tokio runtime; tracked saves and actions are
    /// driven on it.
    pub fn new(config: &StoreConfig) -> SetteraResult<Self> {
        Self::with_values(config, ValueMap::new())
    }

    pub fn with_values(config: &StoreConfig, values: ValueMap) -> SetteraResult<Self> {
        let runtime = Handle::try_current().map_err(|_| SetteraError::MissingRuntime)?;
        let revert_delay = config.save_revert_delay();

        let inner = Arc::new_cyclic(|weak: &Weak<StoreInner>| {
            let notify: Notify = {
                let weak = weak.clone();
                Arc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.emit_change();
                    }
                })
            };

            let errors = ErrorMap::new(notify.clone());
            let saves = SaveTracker::new(notify.clone(), revert_delay, runtime.clone());
            let actions = ActionTracker::new(notify.clone(), runtime.clone());
            let confirms = ConfirmManager::new(notify);
            let values = Arc::new(values);
            let snapshot = Arc::new(SetteraState {
                values: values.clone(),
                errors: errors.errors(),
                save_status: saves.save_status(),
                pending_confirm: confirms.pending_confirm(),
                action_loading: actions.action_loading(),
            });

            StoreInner {
                values: Mutex::new(values),
                snapshot: Mutex::new(snapshot),
                listeners: Arc::new(Listeners::default()),
                errors,
                saves,
                actions,
                confirms,
                callbacks: CallbackRefs::default(),
                validations: Mutex::new(HashMap::new()),
                runtime,
                destroyed: AtomicBool::new(false),
            }
        });

        Ok(Self { inner })
    }

    /// Stage a new value snapshot without notifying subscribers.
    pub fn set_values(&self, values: Arc<ValueMap>) {
        {
            let mut current = self.inner.values.lock();
            if Arc::ptr_eq(&current, &values) {
                return;
            }
            *current = values;
        }
        self.inner.rebuild();
    }

    /// Rebuild the snapshot and notify every subscriber.
    pub fn emit_change(&self) {
        self.inner.emit_change();
    }

    /// Forward a user edit to the host `on_change`; async results are tracked as saves.
    pub fn set_value(&self, key: &str, value: Value) -> SetteraResult<()> {
        self.ensure_usable(key)?;
        let on_change = self.inner.callbacks.on_change();
        if let Outcome::Pending(save) = on_change(key, value) {
            self.inner.saves.track_save(key, save);
        }
        Ok(())
    }

    pub fn set_error(&self, key: &str, message: Option<&str>) {
        self.inner.errors.set_error(key, message);
    }

    /// Run the host validator for `key` and store its verdict.
    ///
    /// Without a validator this clears any stored error. Async validators
    /// race per key; only the most recent one gets to write.
    pub fn validate(&self, key: &str, value: &Value) -> SetteraResult<()> {
        self.ensure_usable(key)?;
        let generation = {
            let mut validations = self.inner.validations.lock();
            let entry = validations.entry(key.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        let Some(validator) = self.inner.callbacks.validator(key) else {
            self.set_error(key, None);
            return Ok(());
        };

        match validator(value) {
            Validation::Ready(message) => self.set_error(key, message.as_deref()),
            Validation::Pending(pending) => {
                let weak = Arc::downgrade(&self.inner);
                let key = key.to_string();
                self.inner.runtime.spawn(async move {
                    let message = pending.await;
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    if inner.destroyed.load(Ordering::Acquire) {
                        return;
                    }
                    if inner.validations.lock().get(&key) != Some(&generation) {
                        debug!("discarding stale validation for {key:?}");
                        return;
                    }
                    inner.errors.set_error(&key, message.as_deref());
                });
            }
        }
        Ok(())
    }

    /// Invoke the registered action handler for `key`.
    ///
    /// Returns `Ok(false)` when an earlier invocation is still in flight.
    pub fn invoke_action(&self, key: &str, payload: Option<Value>) -> SetteraResult<bool> {
        self.ensure_usable(key)?;
        let handler = self
            .inner
            .callbacks
            .action(key)
            .ok_or_else(|| SetteraError::NoActionHandler(key.to_string()))?;
        Ok(self.inner.actions.invoke_action(key, &handler, payload))
    }

    pub fn request_confirm(&self, pending: PendingConfirm) {
        self.inner.confirms.request_confirm(pending);
    }

    pub fn resolve_confirm(&self, confirmed: bool, entered_text: Option<&str>) -> ConfirmOutcome {
        self.inner.confirms.resolve_confirm(confirmed, entered_text)
    }

    pub fn subscribe(&self, listener: Listener) -> Subscription {
        let id = self.inner.listeners.add(listener);
        Subscription::new(id, &self.inner.listeners)
    }

    /// Current snapshot. Same `Arc` until the next rebuild.
    pub fn get_state(&self) -> Arc<SetteraState> {
        self.inner.snapshot.lock().clone()
    }

    pub fn values(&self) -> Arc<ValueMap> {
        self.inner.values.lock().clone()
    }

    pub fn action_loading(&self) -> ActionLoadingSnapshot {
        self.inner.actions.action_loading()
    }

    pub fn callbacks(&self) -> &CallbackRefs {
        &self.inner.callbacks
    }

    /// Tear down timers and silence every in-flight continuation.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.saves.destroy();
        self.inner.actions.destroy();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    pub(crate) fn downgrade(&self) -> WeakValuesStore {
        WeakValuesStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Reject calls on a destroyed store and keys the schema does not define.
    pub(crate) fn ensure_usable(&self, key: &str) -> SetteraResult<()> {
        if self.is_destroyed() {
            return Err(SetteraError::Destroyed);
        }
        if let Some(lookup) = self.inner.callbacks.schema_lookup()
            && lookup(key).is_none()
        {
            return Err(SetteraError::UnknownSetting(key.to_string()));
        }
        Ok(())
    }
}

/// Non-owning store handle for continuations parked inside the store itself.
#[derive(Clone)]
pub(crate) struct WeakValuesStore {
    inner: Weak<StoreInner>,
}

impl WeakValuesStore {
    pub(crate) fn upgrade(&self) -> Option<ValuesStore> {
        self.inner.upgrade().map(|inner| ValuesStore { inner })
    }
}

impl StoreInner {
    fn rebuild(&self) {
        let mut snapshot = self.snapshot.lock();
        *snapshot = Arc::new(SetteraState {
            values: self.values.lock().clone(),
            errors: self.errors.errors(),
            save_status: self.saves.save_status(),
            pending_confirm: self.confirms.pending_confirm(),
            action_loading: self.actions.action_loading(),
        });
    }

    /// Rebuild the snapshot, then notify listeners unless destroyed.
    fn emit_change(&self) {
        self.rebuild();
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }
        self.listeners.notify();
    }
}
