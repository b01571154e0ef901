//! In-process [`StoreGateway`] backed by a JSON tree.
//!
//! Used by the console binary and the test suites. Besides the gateway
//! contract it offers a write log, an availability switch for failure
//! injection, optional write latency, and [`MemoryStore::simulate_disconnect`]
//! to fire the queued disconnect cleanups.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::{child_path, Snapshot, SnapshotCallback, StoreFuture, StoreGateway, SubscriptionHandle};
use crate::{AppError, Result};

/// One applied `publish` or `write`, in application order.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    /// Full path written. For publishes this includes the generated id.
    pub path: String,
    /// Value written; `None` for deletions.
    pub value: Option<Value>,
}

struct Listener {
    segments: Vec<String>,
    callback: SnapshotCallback,
}

struct StoreState {
    root: Value,
    listeners: BTreeMap<u64, Listener>,
    next_handle: u64,
    push_seq: u64,
    pending_disconnect: Vec<String>,
    available: bool,
    latency: Duration,
    writes: Vec<WriteRecord>,
}

/// Pending notification collected under the state lock.
type Delivery = (SnapshotCallback, Snapshot);

/// In-memory push store.
pub struct MemoryStore {
    state: Mutex<StoreState>,
    // Serializes mutation + delivery so listeners see changes in
    // application order.
    delivery: Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty, reachable store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                root: Value::Object(Map::new()),
                listeners: BTreeMap::new(),
                next_handle: 1,
                push_seq: 0,
                pending_disconnect: Vec::new(),
                available: true,
                latency: Duration::ZERO,
                writes: Vec::new(),
            }),
            delivery: Mutex::new(()),
        }
    }

    /// Toggle reachability. While unavailable every fallible operation
    /// fails with `AppError::StoreUnavailable` and nothing is applied.
    pub fn set_available(&self, available: bool) {
        self.lock_state().available = available;
    }

    /// Delay applied before every `publish`/`write` takes effect.
    pub fn set_latency(&self, latency: Duration) {
        self.lock_state().latency = latency;
    }

    /// Current value at `path`.
    #[must_use]
    pub fn read(&self, path: &str) -> Option<Value> {
        let state = self.lock_state();
        value_at(&state.root, &segments(path)).cloned()
    }

    /// Applied writes since creation or the last [`clear_write_log`](Self::clear_write_log).
    #[must_use]
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock_state().writes.clone()
    }

    /// Applied writes whose path starts with `prefix`.
    #[must_use]
    pub fn writes_under(&self, prefix: &str) -> Vec<WriteRecord> {
        self.lock_state()
            .writes
            .iter()
            .filter(|record| record.path.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Forget the write log.
    pub fn clear_write_log(&self) {
        self.lock_state().writes.clear();
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn live_subscriptions(&self) -> usize {
        self.lock_state().listeners.len()
    }

    /// Number of live subscriptions on exactly `path`.
    #[must_use]
    pub fn subscriptions_on(&self, path: &str) -> usize {
        let wanted = segments(path);
        self.lock_state()
            .listeners
            .values()
            .filter(|listener| listener.segments == wanted)
            .count()
    }

    /// Paths queued for removal on disconnect.
    #[must_use]
    pub fn pending_disconnect_paths(&self) -> Vec<String> {
        self.lock_state().pending_disconnect.clone()
    }

    /// Drop the connection: apply and clear every queued disconnect removal.
    pub fn simulate_disconnect(&self) {
        let _order = self.lock_delivery();
        let mut deliveries = Vec::new();
        {
            let mut state = self.lock_state();
            let paths = std::mem::take(&mut state.pending_disconnect);
            for path in paths {
                debug!(%path, "disconnect cleanup");
                deliveries.extend(apply(&mut state, &path, None));
            }
        }
        deliver(deliveries);
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn latency(&self) -> Result<Duration> {
        let state = self.lock_state();
        ensure_available(&state)?;
        Ok(state.latency)
    }

    fn apply_write(&self, path: &str, value: Option<Value>) -> Result<()> {
        let _order = self.lock_delivery();
        let deliveries = {
            let mut state = self.lock_state();
            ensure_available(&state)?;
            apply(&mut state, path, value)
        };
        deliver(deliveries);
        Ok(())
    }

    fn apply_publish(&self, path: &str, value: Value) -> Result<String> {
        let _order = self.lock_delivery();
        let (id, deliveries) = {
            let mut state = self.lock_state();
            ensure_available(&state)?;
            state.push_seq += 1;
            let id = push_id(state.push_seq);
            let deliveries = apply(&mut state, &child_path(path, &id), Some(value));
            (id, deliveries)
        };
        deliver(deliveries);
        Ok(id)
    }
}

impl StoreGateway for MemoryStore {
    fn publish(&self, path: &str, value: Value) -> StoreFuture<'_, String> {
        let path = path.to_owned();
        Box::pin(async move {
            let latency = self.latency()?;
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            self.apply_publish(&path, value)
        })
    }

    fn subscribe(&self, path: &str, on_snapshot: SnapshotCallback) -> Result<SubscriptionHandle> {
        let _order = self.lock_delivery();
        let (handle, initial) = {
            let mut state = self.lock_state();
            ensure_available(&state)?;
            let raw = state.next_handle;
            state.next_handle += 1;
            let wanted = segments(path);
            let initial = Snapshot::from_value(value_at(&state.root, &wanted).cloned());
            state.listeners.insert(
                raw,
                Listener {
                    segments: wanted,
                    callback: on_snapshot.clone(),
                },
            );
            (SubscriptionHandle::new(raw), initial)
        };
        debug!(path, handle = handle.raw(), "subscribed");
        on_snapshot(initial);
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if self.lock_state().listeners.remove(&handle.raw()).is_some() {
            debug!(handle = handle.raw(), "unsubscribed");
        }
    }

    fn write(&self, path: &str, value: Option<Value>) -> StoreFuture<'_, ()> {
        let path = path.to_owned();
        Box::pin(async move {
            let latency = self.latency()?;
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            self.apply_write(&path, value)
        })
    }

    fn on_disconnect_remove(&self, path: &str) -> StoreFuture<'_, ()> {
        let path = path.to_owned();
        Box::pin(async move {
            let mut state = self.lock_state();
            ensure_available(&state)?;
            if !state.pending_disconnect.contains(&path) {
                state.pending_disconnect.push(path);
            }
            Ok(())
        })
    }
}

fn ensure_available(state: &StoreState) -> Result<()> {
    if state.available {
        Ok(())
    } else {
        Err(AppError::StoreUnavailable("memory store is offline".into()))
    }
}

/// Ids sort lexicographically in push order.
fn push_id(seq: u64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{seq:012}-{}", &suffix[..8])
}

fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect()
}

fn value_at<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
        .filter(|value| !is_empty_node(value))
}

fn is_empty_node(value: &Value) -> bool {
    value.is_null() || value.as_object().is_some_and(Map::is_empty)
}

/// Mutate the tree, log the write, and collect notifications for every
/// listener whose path overlaps `path`.
fn apply(state: &mut StoreState, path: &str, value: Option<Value>) -> Vec<Delivery> {
    let value = value.filter(|value| !value.is_null());
    let target = segments(path);
    set_at(&mut state.root, &target, value.clone());
    state.writes.push(WriteRecord {
        path: path.to_owned(),
        value,
    });

    state
        .listeners
        .values()
        .filter(|listener| overlaps(&listener.segments, &target))
        .map(|listener| {
            let current = value_at(&state.root, &listener.segments).cloned();
            (listener.callback.clone(), Snapshot::from_value(current))
        })
        .collect()
}

fn deliver(deliveries: Vec<Delivery>) {
    for (callback, snapshot) in deliveries {
        callback(snapshot);
    }
}

fn overlaps(a: &[String], b: &[String]) -> bool {
    a.iter().zip(b).all(|(x, y)| x == y)
}

fn set_at(node: &mut Value, path: &[String], value: Option<Value>) {
    let Some((head, rest)) = path.split_first() else {
        *node = value.unwrap_or_else(|| Value::Object(Map::new()));
        return;
    };

    if value.is_none() {
        if let Value::Object(map) = node {
            if rest.is_empty() {
                map.remove(head);
            } else if let Some(child) = map.get_mut(head) {
                set_at(child, rest, None);
                if is_empty_node(child) {
                    map.remove(head);
                }
            }
        }
        return;
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(head.clone()).or_insert(Value::Null);
        set_at(child, rest, value);
    }
}
