//! Per-setting controller.
//!
//! Binds one schema definition to the store: reads its slice of the
//! snapshot, and routes edits and actions through confirmation when the
//! definition asks for it.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::{SetteraError, SetteraResult};
use crate::schema::SettingDefinition;
use crate::store::{PendingConfirm, SaveStatus, ValuesStore};
use crate::visibility;

/// What a change or trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Forwarded to the host right away.
    Applied,
    /// Parked behind a confirmation request.
    AwaitingConfirm,
    /// Dropped because an earlier action for the key is still running.
    Ignored,
}

#[derive(Clone)]
pub struct SettingHandle {
    store: ValuesStore,
    definition: Arc<SettingDefinition>,
}

impl ValuesStore {
    /// Controller for `key`. Needs a schema lookup to be installed.
    pub fn setting(&self, key: &str) -> SetteraResult<SettingHandle> {
        self.ensure_usable(key)?;
        let definition = self
            .callbacks()
            .lookup(key)
            .ok_or_else(|| SetteraError::UnknownSetting(key.to_string()))?;
        Ok(SettingHandle {
            store: self.clone(),
            definition,
        })
    }
}

impl SettingHandle {
    pub fn key(&self) -> &str {
        &self.definition.key
    }

    pub fn definition(&self) -> &SettingDefinition {
        &self.definition
    }

    pub fn value(&self) -> Option<Value> {
        self.store.get_state().value(self.key()).cloned()
    }

    pub fn error(&self) -> Option<String> {
        self.store.get_state().error(self.key()).map(str::to_string)
    }

    pub fn save_status(&self) -> SaveStatus {
        self.store.get_state().save_status(self.key())
    }

    pub fn is_loading(&self) -> bool {
        self.store.get_state().is_loading(self.key())
    }

    /// Own visibility rule against the current values.
    pub fn is_visible(&self) -> bool {
        let values = self.store.values();
        visibility::evaluate(self.definition.visible_when.as_ref(), &values)
    }

    /// Validate `value`, then apply it, asking for confirmation first when
    /// the definition carries a confirm config.
    ///
    /// Validation errors are stored for display; they do not block the change.
    pub fn change(&self, value: Value) -> SetteraResult<Dispatch> {
        self.store.validate(self.key(), &value)?;

        if self.definition.confirm.is_none() {
            self.store.set_value(self.key(), value)?;
            return Ok(Dispatch::Applied);
        }

        let weak = self.store.downgrade();
        let key = self.key().to_string();
        self.request_confirm(move || {
            let Some(store) = weak.upgrade() else {
                return;
            };
            if let Err(err) = store.set_value(&key, value) {
                warn!("confirmed change for {key:?} not applied: {err}");
            }
        });
        Ok(Dispatch::AwaitingConfirm)
    }

    /// Run the setting's action, asking for confirmation first when needed.
    pub fn trigger(&self, payload: Option<Value>) -> SetteraResult<Dispatch> {
        if self.store.callbacks().action(self.key()).is_none() {
            return Err(SetteraError::NoActionHandler(self.key().to_string()));
        }

        if self.definition.confirm.is_none() {
            let invoked = self.store.invoke_action(self.key(), payload)?;
            return Ok(if invoked {
                Dispatch::Applied
            } else {
                Dispatch::Ignored
            });
        }

        let weak = self.store.downgrade();
        let key = self.key().to_string();
        self.request_confirm(move || {
            let Some(store) = weak.upgrade() else {
                return;
            };
            if let Err(err) = store.invoke_action(&key, payload) {
                warn!("confirmed action {key:?} not invoked: {err}");
            }
        });
        Ok(Dispatch::AwaitingConfirm)
    }

    fn request_confirm(&self, on_confirm: impl FnOnce() + Send + 'static) {
        let Some(config) = self.definition.confirm.clone() else {
            return;
        };
        let pending = PendingConfirm::new(self.key(), config, on_confirm, || {})
            .dangerous(self.definition.dangerous);
        self.store.request_confirm(pending);
    }
}
