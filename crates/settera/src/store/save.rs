//! Async save lifecycle per key.
//!
//! Each `track_save` bumps a per-key generation. Completions and revert
//! timers only touch the status when their captured generation is still the
//! current one, so an older, slower save can never overwrite a newer one.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::notifier::Notify;

/// Lifecycle state of an async save for one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

/// Immutable key -> save status mapping.
pub type SaveStatusSnapshot = Arc<HashMap<String, SaveStatus>>;

/// A host save in flight.
pub type SaveFuture = BoxFuture<'static, anyhow::Result<()>>;

#[derive(Default)]
struct SaveState {
    status: SaveStatusSnapshot,
    generations: HashMap<String, u64>,
    timers: HashMap<String, JoinHandle<()>>,
}

struct SaveInner {
    state: Mutex<SaveState>,
    destroyed: AtomicBool,
    notify: Notify,
    revert_delay: Duration,
    runtime: Handle,
}

#[derive(Clone)]
pub struct SaveTracker {
    inner: Arc<SaveInner>,
}

impl SaveTracker {
    pub fn new(notify: Notify, revert_delay: Duration, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(SaveInner {
                state: Mutex::new(SaveState::default()),
                destroyed: AtomicBool::new(false),
                notify,
                revert_delay,
                runtime,
            }),
        }
    }

    /// Mark `key` as saving and watch `save` for completion.
    pub fn track_save(&self, key: &str, save: SaveFuture) {
        if self.inner.destroyed.load(Ordering::Acquire) {
            debug!("ignoring save for {key:?} on destroyed store");
            self.inner.runtime.spawn(async move {
                let _ = save.await;
            });
            return;
        }

        let generation = {
            let mut state = self.inner.state.lock();
            let generation = state.generations.get(key).copied().unwrap_or(0) + 1;
            state.generations.insert(key.to_string(), generation);
            if let Some(timer) = state.timers.remove(key) {
                timer.abort();
            }
            set_status(&mut state, key, SaveStatus::Saving);
            generation
        };
        (self.inner.notify)();

        let inner = self.inner.clone();
        let key = key.to_string();
        self.inner.runtime.spawn(async move {
            let result = save.await;
            inner.settle(&key, generation, result);
        });
    }

    pub fn save_status(&self) -> SaveStatusSnapshot {
        self.inner.state.lock().status.clone()
    }

    /// Cancel pending timers and silence every later completion.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::Release);
        let mut state = self.inner.state.lock();
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
    }
}

impl SaveInner {
    fn is_current(state: &SaveState, key: &str, generation: u64) -> bool {
        state.generations.get(key) == Some(&generation)
    }

    fn settle(self: &Arc<Self>, key: &str, generation: u64, result: anyhow::Result<()>) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }

        {
            let mut state = self.state.lock();
            if !Self::is_current(&state, key, generation) {
                debug!("discarding stale save result for {key:?} (generation {generation})");
                return;
            }

            match &result {
                Ok(()) => {
                    set_status(&mut state, key, SaveStatus::Saved);
                    let inner = self.clone();
                    let owned_key = key.to_string();
                    let timer = self.runtime.spawn(async move {
                        tokio::time::sleep(inner.revert_delay).await;
                        inner.revert(&owned_key, generation);
                    });
                    if let Some(previous) = state.timers.insert(key.to_string(), timer) {
                        previous.abort();
                    }
                }
                Err(_) => set_status(&mut state, key, SaveStatus::Error),
            }
        }

        if let Err(err) = result {
            error!("[settera] Save failed for \"{key}\": {err:#}");
        }
        (self.notify)();
    }

    fn revert(&self, key: &str, generation: u64) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }

        {
            let mut state = self.state.lock();
            if !Self::is_current(&state, key, generation) {
                return;
            }
            state.timers.remove(key);
            if state.status.get(key) != Some(&SaveStatus::Saved) {
                return;
            }
            set_status(&mut state, key, SaveStatus::Idle);
        }
        (self.notify)();
    }
}

fn set_status(state: &mut SaveState, key: &str, status: SaveStatus) {
    let mut next = HashMap::clone(&state.status);
    next.insert(key.to_string(), status);
    state.status = Arc::new(next);
}
