//! Settings value engine.
//!
//! Provides:
//! - `ErrorMap`: last validation error per key
//! - `SaveTracker`: async save status with stale-result protection
//! - `ActionTracker`: one in-flight action per key
//! - `ConfirmManager`: a single pending confirmation
//! - `CallbackRefs`: the latest host callbacks
//! - `ValuesStore`: the composite with one subscription and one snapshot

mod actions;
mod callbacks;
mod confirm;
mod errors;
mod notifier;
mod save;
mod values;

pub use actions::{ActionLoadingSnapshot, ActionTracker};
pub use callbacks::{
    ActionHandler, CallbackRefs, ChangeHandler, Outcome, ValidateHandler, Validation,
};
pub use confirm::{ConfirmManager, ConfirmOutcome, ConfirmRequest, Continuation, PendingConfirm};
pub use errors::{ErrorMap, ErrorSnapshot};
pub use notifier::{Listener, Notify, Subscription};
pub use save::{SaveFuture, SaveStatus, SaveStatusSnapshot, SaveTracker};
pub use values::{SetteraState, ValueMap, ValuesStore};
