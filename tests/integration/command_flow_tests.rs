//! Integration tests for user commands routed through the coordinator.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use presence_sync::gateway::StoreGateway;
use presence_sync::models::message::MessageKind;
use presence_sync::models::session::Session;
use presence_sync::presence::PresenceTracker;
use presence_sync::{AppError, SyncConfig};

use super::test_helpers::Harness;

#[tokio::test]
async fn sent_message_reaches_the_view() {
    let mut h = Harness::new();
    h.sign_in("u1", Some("alice@example.com")).await;
    let mut view = h.coordinator.messages();

    let id = h.coordinator.send("  hello world ").await.expect("send");

    assert!(view.has_changed().expect("view sender alive"));
    let messages = view.borrow_and_update().clone();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, id);
    assert_eq!(messages[0].text, "hello world");
    assert_eq!(messages[0].sender_name, "alice");
    assert_eq!(messages[0].kind, MessageKind::Text);
    assert!(messages[0].is_from("u1"));
}

#[tokio::test]
async fn messages_from_two_sends_are_ordered() {
    let mut h = Harness::new();
    h.sign_in("u1", None).await;
    h.coordinator.send("first").await.expect("send");
    h.coordinator.send("second").await.expect("send");

    let texts: Vec<String> = h
        .coordinator
        .messages()
        .borrow()
        .iter()
        .map(|message| message.text.clone())
        .collect();
    assert_eq!(texts, ["first", "second"]);
}

#[tokio::test]
async fn send_while_logged_out_is_rejected() {
    let h = Harness::new();
    let result = h.coordinator.send("hello").await;
    assert_eq!(result, Err(AppError::NoActiveSession));
    assert!(h.store.writes().is_empty());
}

#[tokio::test]
async fn blank_send_is_rejected() {
    let mut h = Harness::new();
    h.sign_in("u1", None).await;
    h.store.clear_write_log();

    let result = h.coordinator.send(" \t ").await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
    assert!(h.store.writes().is_empty());
}

#[tokio::test]
async fn clear_removes_all_messages() {
    let mut h = Harness::new();
    h.sign_in("u1", None).await;
    h.coordinator.send("one").await.expect("send");
    h.coordinator.send("two").await.expect("send");

    h.coordinator.clear().await.expect("clear");
    assert!(h.store.read("messages").is_none());
    assert!(h.coordinator.messages().borrow().is_empty());
    assert!(h.coordinator.message_stream().is_attached());
}

#[tokio::test]
async fn clear_while_logged_out_is_rejected() {
    let h = Harness::new();
    let result = h.coordinator.clear().await;
    assert_eq!(result, Err(AppError::NoActiveSession));
    assert!(h.store.writes().is_empty());
}

#[tokio::test]
async fn set_offline_removes_record_only() {
    let mut h = Harness::new();
    h.sign_in("u1", None).await;

    h.coordinator.set_offline().await.expect("offline");
    assert!(h.record("u1").is_none());
    assert!(h.coordinator.presence().armed_uid().is_none());
    assert!(h.coordinator.message_stream().is_attached());
    assert!(h.coordinator.current_session().is_some());

    // Idempotent.
    h.store.clear_write_log();
    h.coordinator.set_offline().await.expect("offline again");
    assert!(h.store.writes().is_empty());
}

#[tokio::test]
async fn set_offline_while_logged_out_is_a_no_op() {
    let h = Harness::new();
    h.coordinator.set_offline().await.expect("no-op");
    assert!(h.store.writes().is_empty());
}

#[tokio::test]
async fn roster_shows_other_participants() {
    let mut h = Harness::new();
    h.sign_in("u1", Some("alice@example.com")).await;

    // A second participant sharing the same store.
    let gateway: Arc<dyn StoreGateway> = h.store.clone();
    let (_session, session_rx) = watch::channel(Some(Session::new("u2")));
    let tracker = PresenceTracker::new(
        gateway,
        &SyncConfig::default(),
        session_rx,
        CancellationToken::new(),
    );
    tracker.mark_online("u2", "bob").await.expect("u2 online");

    let roster = h.coordinator.roster().borrow().clone();
    assert_eq!(roster.len(), 2);
    assert_eq!(roster["u2"].display_name, "bob");

    tracker.mark_offline().await.expect("u2 offline");
    assert_eq!(h.coordinator.roster().borrow().len(), 1);
}

#[tokio::test]
async fn shutdown_leaves_record_to_disconnect_cleanup() {
    let mut h = Harness::new();
    h.sign_in("u1", None).await;
    h.store.clear_write_log();

    h.coordinator.shutdown().await;
    assert!(h.store.writes().is_empty());
    assert!(h.record("u1").is_some());
    assert_eq!(h.store.live_subscriptions(), 0);
    assert!(h.ct.is_cancelled());

    h.store.simulate_disconnect();
    assert!(h.record("u1").is_none());
    assert!(h.store.pending_disconnect_paths().is_empty());
}
