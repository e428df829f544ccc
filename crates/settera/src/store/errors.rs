use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::notifier::Notify;

/// Immutable key -> validation message mapping.
pub type ErrorSnapshot = Arc<HashMap<String, String>>;

/// Last validation error per key.
///
/// Only real changes notify; the snapshot keeps its identity until then.
pub struct ErrorMap {
    errors: Mutex<ErrorSnapshot>,
    notify: Notify,
}

impl ErrorMap {
    pub fn new(notify: Notify) -> Self {
        Self {
            errors: Mutex::new(Arc::default()),
            notify,
        }
    }

    /// Store `message` for `key`, or clear it when `message` is `None` or empty.
    pub fn set_error(&self, key: &str, message: Option<&str>) {
        {
            let mut errors = self.errors.lock();
            match message.filter(|message| !message.is_empty()) {
                None => {
                    if !errors.contains_key(key) {
                        return;
                    }
                    let mut next = HashMap::clone(&errors);
                    next.remove(key);
                    *errors = Arc::new(next);
                }
                Some(message) => {
                    if errors.get(key).is_some_and(|current| current == message) {
                        return;
                    }
                    let mut next = HashMap::clone(&errors);
                    next.insert(key.to_string(), message.to_string());
                    *errors = Arc::new(next);
                }
            }
        }
        (self.notify)();
    }

    pub fn errors(&self) -> ErrorSnapshot {
        self.errors.lock().clone()
    }
}
