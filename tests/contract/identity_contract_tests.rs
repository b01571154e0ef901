//! Contract tests for identity providers and the session monitor built on
//! top of them.

use std::sync::{Arc, Mutex};

use presence_sync::identity::{IdentityProvider, LocalIdentity, SessionCallback, SessionMonitor};
use presence_sync::models::session::{Session, SessionTransition};

fn drain(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<SessionTransition>,
) -> Vec<SessionTransition> {
    let mut out = Vec::new();
    while let Ok(transition) = rx.try_recv() {
        out.push(transition);
    }
    out
}

#[test]
fn provider_reports_current_session_on_register() {
    let identity = LocalIdentity::new();
    identity.sign_in(Session::new("u1"));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: SessionCallback = Arc::new(move |session: Option<Session>| sink.lock().unwrap().push(session));
    identity.on_session_change(callback);

    assert_eq!(*seen.lock().unwrap(), [Some(Session::new("u1"))]);
}

#[test]
fn provider_notifies_every_observation() {
    let identity = LocalIdentity::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: SessionCallback = Arc::new(move |session: Option<Session>| sink.lock().unwrap().push(session));
    let id = identity.on_session_change(callback);

    identity.sign_in(Session::new("u1"));
    identity.renotify();
    identity.sign_out();
    assert_eq!(
        *seen.lock().unwrap(),
        [
            None,
            Some(Session::new("u1")),
            Some(Session::new("u1")),
            None
        ]
    );

    identity.remove_listener(id);
    identity.sign_in(Session::new("u2"));
    assert_eq!(seen.lock().unwrap().len(), 4);
    assert_eq!(identity.listener_count(), 0);
}

#[test]
fn monitor_emits_deduplicated_transitions() {
    let identity = Arc::new(LocalIdentity::new());
    let provider: Arc<dyn IdentityProvider> = identity.clone();
    let (_monitor, mut rx) = SessionMonitor::start(provider);
    assert!(drain(&mut rx).is_empty());

    identity.sign_in(Session::new("u1"));
    identity.renotify();
    identity.sign_in(Session::new("u1"));
    identity.sign_in(Session::new("u2"));
    identity.sign_out();
    identity.sign_out();

    assert_eq!(
        drain(&mut rx),
        [
            SessionTransition::Started(Session::new("u1")),
            SessionTransition::Started(Session::new("u2")),
            SessionTransition::Ended,
        ]
    );
}

#[test]
fn monitor_session_view_tracks_latest_observation() {
    let identity = Arc::new(LocalIdentity::new());
    let provider: Arc<dyn IdentityProvider> = identity.clone();
    let (monitor, _rx) = SessionMonitor::start(provider);
    let view = monitor.session();
    assert!(monitor.current().is_none());

    identity.sign_in(Session::with_email("u1", "alice@example.com"));
    assert_eq!(
        view.borrow().as_ref().map(|session| session.uid.as_str()),
        Some("u1")
    );
    assert_eq!(monitor.current(), identity.current());

    identity.sign_out();
    assert!(view.borrow().is_none());
}

#[test]
fn dropping_monitor_removes_listener() {
    let identity = Arc::new(LocalIdentity::new());
    let provider: Arc<dyn IdentityProvider> = identity.clone();
    let (monitor, mut rx) = SessionMonitor::start(provider);
    assert_eq!(identity.listener_count(), 1);

    drop(monitor);
    assert_eq!(identity.listener_count(), 0);
    identity.sign_in(Session::new("u1"));
    assert!(drain(&mut rx).is_empty());
}
