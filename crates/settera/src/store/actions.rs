//! Action invocation with per-key in-flight dedup.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, error};

use super::callbacks::{ActionHandler, Outcome};
use super::notifier::Notify;

/// Immutable key -> loading mapping. Keys are present only while loading.
pub type ActionLoadingSnapshot = Arc<HashMap<String, bool>>;

#[derive(Default)]
struct ActionState {
    /// Keys whose handler is running, including synchronous calls still on the stack.
    in_flight: HashSet<String>,
    loading: ActionLoadingSnapshot,
}

struct ActionInner {
    state: Mutex<ActionState>,
    destroyed: AtomicBool,
    notify: Notify,
    runtime: Handle,
}

#[derive(Clone)]
pub struct ActionTracker {
    inner: Arc<ActionInner>,
}

impl ActionTracker {
    pub fn new(notify: Notify, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(ActionInner {
                state: Mutex::new(ActionState::default()),
                destroyed: AtomicBool::new(false),
                notify,
                runtime,
            }),
        }
    }

    /// Run `handler` for `key` unless a previous invocation is still in flight.
    ///
    /// Returns whether the handler was called.
    pub fn invoke_action(&self, key: &str, handler: &ActionHandler, payload: Option<Value>) -> bool {
        if !self.inner.state.lock().in_flight.insert(key.to_string()) {
            debug!("action {key:?} already in flight, ignoring");
            return false;
        }

        match handler(payload) {
            Outcome::Done => {
                self.inner.state.lock().in_flight.remove(key);
            }
            Outcome::Pending(work) => {
                if self.inner.destroyed.load(Ordering::Acquire) {
                    self.inner.state.lock().in_flight.remove(key);
                    self.inner.runtime.spawn(async move {
                        let _ = work.await;
                    });
                    return true;
                }
                {
                    let mut state = self.inner.state.lock();
                    let mut next = HashMap::clone(&state.loading);
                    next.insert(key.to_string(), true);
                    state.loading = Arc::new(next);
                }
                (self.inner.notify)();

                let inner = self.inner.clone();
                let key = key.to_string();
                self.inner.runtime.spawn(async move {
                    let result = work.await;
                    inner.finish(&key, result);
                });
            }
        }
        true
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.inner.state.lock().loading.contains_key(key)
    }

    pub fn action_loading(&self) -> ActionLoadingSnapshot {
        self.inner.state.lock().loading.clone()
    }

    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::Release);
    }
}

impl ActionInner {
    fn finish(&self, key: &str, result: anyhow::Result<()>) {
        {
            let mut state = self.state.lock();
            state.in_flight.remove(key);
            let mut next = HashMap::clone(&state.loading);
            next.remove(key);
            state.loading = Arc::new(next);
        }

        if let Err(err) = result {
            error!("[settera] Action \"{key}\" failed: {err:#}");
        }
        if !self.destroyed.load(Ordering::Acquire) {
            (self.notify)();
        }
    }
}
