//! In-process identity provider driven by explicit sign-in/sign-out calls.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;

use super::{IdentityProvider, ListenerId, SessionCallback};
use crate::models::session::Session;

#[derive(Default)]
struct LocalState {
    current: Option<Session>,
    listeners: BTreeMap<u64, SessionCallback>,
    next_id: u64,
}

/// Identity provider whose session is set by the embedding program.
#[derive(Default)]
pub struct LocalIdentity {
    state: Mutex<LocalState>,
}

impl LocalIdentity {
    /// Signed-out provider with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `session` current and notify listeners.
    pub fn sign_in(&self, session: Session) {
        info!(uid = %session.uid, "signed in");
        self.set(Some(session));
    }

    /// Clear the current session and notify listeners.
    pub fn sign_out(&self) {
        info!("signed out");
        self.set(None);
    }

    /// Re-deliver the current session without changing it, the way real
    /// providers occasionally repeat a callback.
    pub fn renotify(&self) {
        let (current, listeners) = {
            let state = self.lock_state();
            (state.current.clone(), snapshot(&state))
        };
        notify(&listeners, current.as_ref());
    }

    /// Session currently signed in.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.lock_state().current.clone()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock_state().listeners.len()
    }

    fn set(&self, session: Option<Session>) {
        let (current, listeners) = {
            let mut state = self.lock_state();
            state.current = session;
            (state.current.clone(), snapshot(&state))
        };
        notify(&listeners, current.as_ref());
    }

    fn lock_state(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IdentityProvider for LocalIdentity {
    fn on_session_change(&self, callback: SessionCallback) -> ListenerId {
        let (id, current) = {
            let mut state = self.lock_state();
            state.next_id += 1;
            let id = state.next_id;
            state.listeners.insert(id, callback.clone());
            (id, state.current.clone())
        };
        callback(current);
        ListenerId::new(id)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.lock_state().listeners.remove(&id.raw());
    }
}

fn snapshot(state: &LocalState) -> Vec<SessionCallback> {
    state.listeners.values().cloned().collect()
}

fn notify(listeners: &[SessionCallback], session: Option<&Session>) {
    for listener in listeners {
        listener(session.cloned());
    }
}
