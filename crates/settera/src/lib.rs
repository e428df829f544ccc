//! Settings value engine for schema-driven settings UIs.
//!
//! This crate owns the runtime state behind a settings screen and stays out
//! of rendering. It provides:
//! - A pure visibility rule evaluator (`visibility`)
//! - Per-key validation errors, async save status, action loading state and
//!   a single pending confirmation, composed into one subscribable snapshot
//!   (`store`)
//! - A per-setting controller that routes edits through confirmation
//!   (`setting`)
//!
//! ```no_run
//! use std::sync::Arc;
//! use settera::{StoreConfig, ValuesStore};
//!
//! # async fn demo() -> settera::SetteraResult<()> {
//! let store = ValuesStore::new(&StoreConfig::default())?;
//! let subscription = store.subscribe(Arc::new(|| println!("settings changed")));
//! store.set_error("theme", Some("unsupported theme"));
//! assert_eq!(store.get_state().error("theme"), Some("unsupported theme"));
//! subscription.unsubscribe();
//! store.destroy();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod schema;
pub mod setting;
pub mod store;
pub mod visibility;

pub use crate::config::StoreConfig;
pub use error::{SetteraError, SetteraResult};
pub use schema::{
    ConfirmConfig, PageDefinition, SchemaIndex, SchemaLookup, SectionDefinition,
    SettingDefinition, SettingType, SetteraSchema,
};
pub use setting::{Dispatch, SettingHandle};
pub use store::{
    ActionHandler, ChangeHandler, ConfirmOutcome, ConfirmRequest, Outcome, PendingConfirm,
    SaveStatus, SetteraState, Subscription, ValidateHandler, Validation, ValueMap, ValuesStore,
};
pub use visibility::{VisibilityCondition, VisibilityRule, VisibilityRules, evaluate};
