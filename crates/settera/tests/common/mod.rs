//! Test utilities and common setup.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{Value, json};
use settera::{
    ActionHandler, Outcome, SchemaIndex, SetteraSchema, StoreConfig, Subscription, ValuesStore,
};
use tokio::sync::oneshot;

/// A future the test resolves by hand.
pub fn deferred<T: Send + 'static>(
    on_drop: impl FnOnce() -> T + Send + 'static,
) -> (oneshot::Sender<T>, BoxFuture<'static, T>) {
    let (tx, rx) = oneshot::channel();
    let fut = async move { rx.await.unwrap_or_else(|_| on_drop()) };
    (tx, fut.boxed())
}

/// Let spawned continuations run.
pub async fn flush() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Count notifications delivered to a subscriber.
pub fn count_notifications(store: &ValuesStore) -> (Subscription, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let subscription = store.subscribe(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    (subscription, calls)
}

/// Save results queued by a host `on_change`, in call order.
pub type SaveQueue = Arc<Mutex<Vec<(String, Value, oneshot::Sender<anyhow::Result<()>>)>>>;

/// Install an `on_change` whose saves park until the test resolves them.
pub fn install_parked_saves(store: &ValuesStore) -> SaveQueue {
    let queue: SaveQueue = Arc::new(Mutex::new(Vec::new()));
    let sink = queue.clone();
    store
        .callbacks()
        .set_on_change(Arc::new(move |key: &str, value: Value| {
            let (tx, fut) = deferred(|| Err(anyhow::anyhow!("save abandoned")));
            sink.lock().push((key.to_string(), value, tx));
            Outcome::Pending(fut)
        }));
    queue
}

/// Action handler that parks each call; returns the handler, a call counter and the senders.
pub fn parked_action() -> (
    ActionHandler,
    Arc<AtomicUsize>,
    Arc<Mutex<Vec<oneshot::Sender<anyhow::Result<()>>>>>,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let senders = Arc::new(Mutex::new(Vec::new()));
    let count = calls.clone();
    let queue = senders.clone();
    let handler: ActionHandler = Arc::new(move |_payload: Option<Value>| {
        count.fetch_add(1, Ordering::SeqCst);
        let (tx, fut) = deferred(|| Err(anyhow::anyhow!("action abandoned")));
        queue.lock().push(tx);
        Outcome::Pending(fut)
    });
    (handler, calls, senders)
}

pub fn install_actions(store: &ValuesStore, handlers: Vec<(&str, ActionHandler)>) {
    let map: HashMap<String, ActionHandler> = handlers
        .into_iter()
        .map(|(key, handler)| (key.to_string(), handler))
        .collect();
    store.callbacks().set_on_action(map);
}

pub fn sample_schema() -> SetteraSchema {
    serde_json::from_value(json!({
        "pages": [{
            "key": "general",
            "title": "General",
            "sections": [{
                "key": "profile",
                "title": "Profile",
                "settings": [
                    {"key": "name", "type": "text", "default": ""},
                    {"key": "notifications", "type": "boolean", "default": true},
                    {"key": "digest", "type": "select", "default": "daily",
                     "visibleWhen": {"settingKey": "notifications", "equals": true}}
                ]
            }, {
                "key": "danger",
                "title": "Danger zone",
                "settings": [
                    {"key": "telemetry", "type": "boolean", "default": false,
                     "dangerous": true,
                     "confirm": {"title": "Disable telemetry?"}},
                    {"key": "wipe", "type": "action", "dangerous": true,
                     "confirm": {"title": "Wipe all data?", "requireText": "DELETE"}},
                    {"key": "export", "type": "action"}
                ]
            }]
        }]
    }))
    .expect("sample schema is valid")
}

/// Store with the sample schema installed and its defaults loaded.
pub fn store_with_schema(config: &StoreConfig) -> ValuesStore {
    let schema = sample_schema();
    let store = ValuesStore::with_values(config, schema.default_values())
        .expect("store created inside runtime");
    store
        .callbacks()
        .set_schema_lookup(SchemaIndex::new(&schema).into_lookup());
    store
}
