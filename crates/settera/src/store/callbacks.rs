//! Latest host callbacks.
//!
//! The host replaces these whenever it re-renders. Sub-stores read through
//! here at call time, so they always dispatch to the current functions.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;

use crate::schema::{SchemaLookup, SettingDefinition};

/// Result of a host callback: finished synchronously, or still running.
pub enum Outcome {
    Done,
    Pending(BoxFuture<'static, anyhow::Result<()>>),
}

/// Result of a validator: a message (or `None` when valid), now or later.
pub enum Validation {
    Ready(Option<String>),
    Pending(BoxFuture<'static, Option<String>>),
}

pub type ChangeHandler = Arc<dyn Fn(&str, Value) -> Outcome + Send + Sync>;
pub type ValidateHandler = Arc<dyn Fn(&Value) -> Validation + Send + Sync>;
pub type ActionHandler = Arc<dyn Fn(Option<Value>) -> Outcome + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    on_change: Option<ChangeHandler>,
    on_validate: HashMap<String, ValidateHandler>,
    on_action: HashMap<String, ActionHandler>,
    schema_lookup: Option<SchemaLookup>,
}

#[derive(Default)]
pub struct CallbackRefs {
    inner: RwLock<Callbacks>,
}

impl CallbackRefs {
    pub fn set_on_change(&self, handler: ChangeHandler) {
        self.inner.write().on_change = Some(handler);
    }

    pub fn set_on_validate(&self, handlers: HashMap<String, ValidateHandler>) {
        self.inner.write().on_validate = handlers;
    }

    pub fn set_on_action(&self, handlers: HashMap<String, ActionHandler>) {
        self.inner.write().on_action = handlers;
    }

    pub fn set_schema_lookup(&self, lookup: SchemaLookup) {
        self.inner.write().schema_lookup = Some(lookup);
    }

    /// Current change handler, or a no-op when none is installed.
    pub fn on_change(&self) -> ChangeHandler {
        let handler = self.inner.read().on_change.clone();
        handler.unwrap_or_else(|| {
            let noop: ChangeHandler = Arc::new(|_: &str, _: Value| Outcome::Done);
            noop
        })
    }

    pub fn validator(&self, key: &str) -> Option<ValidateHandler> {
        self.inner.read().on_validate.get(key).cloned()
    }

    pub fn action(&self, key: &str) -> Option<ActionHandler> {
        self.inner.read().on_action.get(key).cloned()
    }

    pub fn schema_lookup(&self) -> Option<SchemaLookup> {
        self.inner.read().schema_lookup.clone()
    }

    /// Resolve `key` through the installed schema lookup.
    ///
    /// `None` both when no lookup is installed and when the key is unknown;
    /// use `schema_lookup` to tell the two apart.
    pub fn lookup(&self, key: &str) -> Option<Arc<SettingDefinition>> {
        let lookup = self.schema_lookup()?;
        lookup(key)
    }
}
