//! Contract tests for the `StoreGateway` behavior the core relies on,
//! exercised against `MemoryStore`.

use std::sync::{Arc, Mutex};

use serde_json::json;

use presence_sync::gateway::memory::MemoryStore;
use presence_sync::gateway::{Snapshot, SnapshotCallback, StoreGateway};
use presence_sync::AppError;

fn recorder() -> (SnapshotCallback, Arc<Mutex<Vec<Snapshot>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: SnapshotCallback = Arc::new(move |snapshot: Snapshot| {
        sink.lock().unwrap().push(snapshot);
    });
    (callback, seen)
}

#[tokio::test]
async fn subscribe_delivers_initial_snapshot() {
    let store = MemoryStore::new();
    let (callback, seen) = recorder();
    store.subscribe("messages", callback).expect("subscribe");
    assert_eq!(*seen.lock().unwrap(), [Snapshot::Absent]);

    store
        .write("onlineUsers/u1", Some(json!({"displayName": "a"})))
        .await
        .expect("write");
    let (callback, seen) = recorder();
    store.subscribe("onlineUsers", callback).expect("subscribe");
    assert_eq!(
        *seen.lock().unwrap(),
        [Snapshot::Present(json!({"u1": {"displayName": "a"}}))]
    );
}

#[tokio::test]
async fn publish_generates_ordered_ids() {
    let store = MemoryStore::new();
    let first = store.publish("messages", json!({"n": 1})).await.expect("publish");
    let second = store.publish("messages", json!({"n": 2})).await.expect("publish");
    assert_ne!(first, second);
    assert!(first < second, "push ids sort in push order");
    assert_eq!(store.read(&format!("messages/{first}")), Some(json!({"n": 1})));
}

#[tokio::test]
async fn child_changes_notify_parent_listener() {
    let store = MemoryStore::new();
    let (callback, seen) = recorder();
    store.subscribe("messages", callback).expect("subscribe");

    let id = store.publish("messages", json!({"n": 1})).await.expect("publish");
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    let entries = seen[1].entries().expect("object snapshot");
    assert!(entries.contains_key(&id));
}

#[tokio::test]
async fn parent_delete_notifies_child_listener() {
    let store = MemoryStore::new();
    store
        .write("onlineUsers/u1", Some(json!({"displayName": "a"})))
        .await
        .expect("write");
    let (callback, seen) = recorder();
    store.subscribe("onlineUsers/u1", callback).expect("subscribe");

    store.write("onlineUsers", None).await.expect("delete");
    assert_eq!(seen.lock().unwrap().last(), Some(&Snapshot::Absent));
}

#[tokio::test]
async fn unrelated_paths_do_not_notify() {
    let store = MemoryStore::new();
    let (callback, seen) = recorder();
    store.subscribe("messages", callback).expect("subscribe");

    store
        .write("onlineUsers/u1", Some(json!({"displayName": "a"})))
        .await
        .expect("write");
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unsubscribe_stops_deliveries() {
    let store = MemoryStore::new();
    let (callback, seen) = recorder();
    let handle = store.subscribe("messages", callback).expect("subscribe");
    store.unsubscribe(handle);
    // Unknown handles are ignored.
    store.unsubscribe(handle);

    store.publish("messages", json!({"n": 1})).await.expect("publish");
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(store.live_subscriptions(), 0);
}

#[tokio::test]
async fn deleting_last_child_prunes_parent() {
    let store = MemoryStore::new();
    store
        .write("onlineUsers/u1", Some(json!({"displayName": "a"})))
        .await
        .expect("write");
    store.write("onlineUsers/u1", None).await.expect("delete");
    assert!(store.read("onlineUsers").is_none());
    assert!(store.read("onlineUsers/u1").is_none());
}

#[tokio::test]
async fn writing_null_deletes() {
    let store = MemoryStore::new();
    store
        .write("messages/m1", Some(json!({"n": 1})))
        .await
        .expect("write");
    store
        .write("messages/m1", Some(serde_json::Value::Null))
        .await
        .expect("null write");
    assert!(store.read("messages/m1").is_none());
    assert_eq!(store.writes().last().and_then(|w| w.value.clone()), None);
}

#[tokio::test]
async fn offline_store_rejects_everything() {
    let store = MemoryStore::new();
    store.set_available(false);

    let (callback, _seen) = recorder();
    assert!(matches!(
        store.subscribe("messages", callback),
        Err(AppError::StoreUnavailable(_))
    ));
    assert!(matches!(
        store.publish("messages", json!({})).await,
        Err(AppError::StoreUnavailable(_))
    ));
    assert!(matches!(
        store.write("messages", None).await,
        Err(AppError::StoreUnavailable(_))
    ));
    assert!(matches!(
        store.on_disconnect_remove("onlineUsers/u1").await,
        Err(AppError::StoreUnavailable(_))
    ));
    assert!(store.writes().is_empty());
    assert!(store.pending_disconnect_paths().is_empty());
    assert_eq!(store.live_subscriptions(), 0);
}

#[tokio::test]
async fn disconnect_cleanup_runs_once() {
    let store = MemoryStore::new();
    store
        .write("onlineUsers/u1", Some(json!({"displayName": "a"})))
        .await
        .expect("write");
    store
        .on_disconnect_remove("onlineUsers/u1")
        .await
        .expect("register");
    store
        .on_disconnect_remove("onlineUsers/u1")
        .await
        .expect("register again");
    assert_eq!(store.pending_disconnect_paths(), ["onlineUsers/u1"]);

    let (callback, seen) = recorder();
    store.subscribe("onlineUsers", callback).expect("subscribe");

    store.simulate_disconnect();
    assert!(store.read("onlineUsers/u1").is_none());
    assert_eq!(seen.lock().unwrap().last(), Some(&Snapshot::Absent));
    assert!(store.pending_disconnect_paths().is_empty());

    store.clear_write_log();
    store.simulate_disconnect();
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn writes_are_logged_in_order() {
    let store = MemoryStore::new();
    store.write("a/x", Some(json!(1))).await.expect("write");
    let id = store.publish("b", json!(2)).await.expect("publish");
    store.write("a/x", None).await.expect("delete");

    let paths: Vec<String> = store.writes().into_iter().map(|w| w.path).collect();
    assert_eq!(paths, ["a/x".to_owned(), format!("b/{id}"), "a/x".to_owned()]);
    assert_eq!(store.writes_under("a/").len(), 2);
}
