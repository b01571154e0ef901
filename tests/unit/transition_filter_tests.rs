//! Unit tests for duplicate suppression of raw session observations.

use presence_sync::identity::TransitionFilter;
use presence_sync::models::session::{Session, SessionTransition};

#[test]
fn first_session_starts() {
    let mut filter = TransitionFilter::default();
    let session = Session::new("u1");
    assert_eq!(
        filter.observe(Some(&session)),
        Some(SessionTransition::Started(session.clone()))
    );
    assert_eq!(filter.last_uid(), Some("u1"));
}

#[test]
fn repeated_uid_is_suppressed() {
    let mut filter = TransitionFilter::default();
    let session = Session::new("u1");
    assert!(filter.observe(Some(&session)).is_some());
    assert_eq!(filter.observe(Some(&session)), None);

    // Same uid with different attributes is still the same session.
    let with_email = Session::with_email("u1", "alice@example.com");
    assert_eq!(filter.observe(Some(&with_email)), None);
}

#[test]
fn uid_switch_starts_new_session_without_end() {
    let mut filter = TransitionFilter::default();
    filter.observe(Some(&Session::new("u1")));
    let next = Session::new("u2");
    assert_eq!(
        filter.observe(Some(&next)),
        Some(SessionTransition::Started(next.clone()))
    );
    assert_eq!(filter.last_uid(), Some("u2"));
}

#[test]
fn sign_out_ends_once() {
    let mut filter = TransitionFilter::default();
    filter.observe(Some(&Session::new("u1")));
    assert_eq!(filter.observe(None), Some(SessionTransition::Ended));
    assert_eq!(filter.observe(None), None);
    assert_eq!(filter.last_uid(), None);
}

#[test]
fn initial_signed_out_observation_is_suppressed() {
    let mut filter = TransitionFilter::default();
    assert_eq!(filter.observe(None), None);
}

#[test]
fn sign_in_after_sign_out_starts_again() {
    let mut filter = TransitionFilter::default();
    let session = Session::new("u1");
    filter.observe(Some(&session));
    filter.observe(None);
    assert_eq!(
        filter.observe(Some(&session)),
        Some(SessionTransition::Started(session.clone()))
    );
}
