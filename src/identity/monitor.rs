//! De-duplicating session transition monitor.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::{IdentityProvider, ListenerId, SessionCallback};
use crate::models::session::{Session, SessionTransition};

/// Pure duplicate-suppression state machine over raw observations.
///
/// Emits `Started` only when the observed uid differs from the previous
/// observation (including none -> uid and uid A -> uid B) and `Ended` only
/// when a session was previously observed.
#[derive(Debug, Default)]
pub struct TransitionFilter {
    last_uid: Option<String>,
}

impl TransitionFilter {
    /// Feed one observation; returns the transition to emit, if any.
    pub fn observe(&mut self, session: Option<&Session>) -> Option<SessionTransition> {
        match (session, self.last_uid.as_deref()) {
            (Some(session), Some(last)) if session.uid == last => None,
            (Some(session), _) => {
                self.last_uid = Some(session.uid.clone());
                Some(SessionTransition::Started(session.clone()))
            }
            (None, None) => None,
            (None, Some(_)) => {
                self.last_uid = None;
                Some(SessionTransition::Ended)
            }
        }
    }

    /// Uid of the last observed session.
    #[must_use]
    pub fn last_uid(&self) -> Option<&str> {
        self.last_uid.as_deref()
    }
}

/// Registration with an identity provider that emits de-duplicated
/// transitions on an unbounded channel.
///
/// The listener is removed from the provider when the monitor is dropped.
pub struct SessionMonitor {
    provider: Arc<dyn IdentityProvider>,
    listener: ListenerId,
    session: watch::Receiver<Option<Session>>,
}

impl SessionMonitor {
    /// Register with `provider` and return the monitor with its transition
    /// stream.
    ///
    /// Providers report the current session on registration, so a
    /// signed-in provider yields a `Started` transition right away.
    #[must_use]
    pub fn start(
        provider: Arc<dyn IdentityProvider>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionTransition>) {
        let (transition_tx, transition_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = watch::channel(None);
        let filter = Mutex::new(TransitionFilter::default());

        let callback: SessionCallback = Arc::new(move |session: Option<Session>| {
            let mut filter = filter.lock().unwrap_or_else(PoisonError::into_inner);
            let transition = filter.observe(session.as_ref());
            session_tx.send_replace(session);

            let Some(transition) = transition else {
                debug!("duplicate session observation suppressed");
                return;
            };
            debug!(uid = transition.uid(), "session transition");
            if transition_tx.send(transition).is_err() {
                debug!("transition receiver dropped");
            }
        });

        let listener = provider.on_session_change(callback);
        let monitor = Self {
            provider,
            listener,
            session: session_rx,
        };
        (monitor, transition_rx)
    }

    /// Live view of the most recently observed session.
    ///
    /// Updated synchronously on every provider callback, ahead of the
    /// transition it may produce.
    #[must_use]
    pub fn session(&self) -> watch::Receiver<Option<Session>> {
        self.session.clone()
    }

    /// Most recently observed session.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.session.borrow().clone()
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.provider.remove_listener(self.listener);
    }
}
