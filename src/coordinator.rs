//! Top-level session state machine.
//!
//! [`LifecycleCoordinator`] owns the presence tracker and both streams and
//! drives them from de-duplicated session transitions:
//!
//! | From | Event | To | Action |
//! |------|-------|----|--------|
//! | `LoggedOut` | `Started(u)` | `Active(u)` | mark `u` online, attach streams |
//! | `Active(u)` | `Started(u)` | `Active(u)` | none |
//! | `Active(a)` | `Started(b)` | `Active(b)` | re-arm presence for `b`; streams stay attached |
//! | `Active(u)` | `Ended` | `LoggedOut` | delete `u`'s record, disarm heartbeat, detach streams |
//! | `LoggedOut` | `Ended` | `LoggedOut` | none |
//!
//! Transitions and commands are serialized through one async mutex, so no
//! two of them interleave their store writes.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::config::SyncConfig;
use crate::gateway::StoreGateway;
use crate::identity::{IdentityProvider, SessionMonitor};
use crate::models::message::Message;
use crate::models::session::{Session, SessionTransition};
use crate::presence::PresenceTracker;
use crate::streams::{MessageStream, Roster, RosterStream};
use crate::{AppError, Result};

/// Coordinator state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No session.
    LoggedOut,
    /// A session for this user is active.
    Active(Session),
}

impl Phase {
    /// Uid of the active session.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        match self {
            Self::LoggedOut => None,
            Self::Active(session) => Some(&session.uid),
        }
    }
}

struct CoordinatorState {
    phase: Phase,
    streams_attached: bool,
}

/// Ties session transitions to presence and feed subscriptions.
pub struct LifecycleCoordinator {
    monitor: SessionMonitor,
    presence: PresenceTracker,
    messages: MessageStream,
    roster: RosterStream,
    state: Mutex<CoordinatorState>,
    display_name_uid_chars: usize,
    cancel: CancellationToken,
}

impl LifecycleCoordinator {
    /// Build the coordinator and register with `identity`.
    ///
    /// Returns the coordinator in `LoggedOut` with the transition stream it
    /// must be fed from, either via [`spawn`](Self::spawn) or by calling
    /// [`handle_transition`](Self::handle_transition) directly. Cancelling
    /// `cancel` stops the event loop and every heartbeat.
    #[must_use]
    pub fn new(
        config: &SyncConfig,
        gateway: Arc<dyn StoreGateway>,
        identity: Arc<dyn IdentityProvider>,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<SessionTransition>) {
        let (monitor, transitions) = SessionMonitor::start(identity);
        let session = monitor.session();

        let coordinator = Self {
            presence: PresenceTracker::new(
                Arc::clone(&gateway),
                config,
                session.clone(),
                cancel.child_token(),
            ),
            messages: MessageStream::new(Arc::clone(&gateway), config, session),
            roster: RosterStream::new(gateway, config),
            monitor,
            state: Mutex::new(CoordinatorState {
                phase: Phase::LoggedOut,
                streams_attached: false,
            }),
            display_name_uid_chars: config.presence.display_name_uid_chars,
            cancel,
        };
        (coordinator, transitions)
    }

    /// Run the event loop until cancellation or until the transition
    /// stream closes, then release every timer and subscription.
    #[must_use]
    pub fn spawn(
        self: Arc<Self>,
        mut transitions: mpsc::UnboundedReceiver<SessionTransition>,
    ) -> JoinHandle<()> {
        tokio::spawn(
            async move {
                loop {
                    let transition = tokio::select! {
                        () = self.cancel.cancelled() => break,
                        next = transitions.recv() => match next {
                            Some(transition) => transition,
                            None => break,
                        },
                    };
                    if let Err(err) = self.handle_transition(transition).await {
                        error!(%err, "session transition action failed");
                    }
                }
                self.shutdown().await;
                info!("lifecycle coordinator stopped");
            }
            .instrument(info_span!("lifecycle_coordinator")),
        )
    }

    /// Apply one transition.
    ///
    /// The phase always advances, even when a store action fails; the
    /// failure is returned after the remaining actions ran, and
    /// [`refresh`](Self::refresh) can re-arm what is missing.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` from the first failing presence
    /// write or stream attach.
    pub async fn handle_transition(&self, transition: SessionTransition) -> Result<()> {
        let mut state = self.state.lock().await;
        match transition {
            SessionTransition::Started(session) => {
                if let Phase::Active(current) = &state.phase {
                    if current.uid == session.uid {
                        debug!(uid = %session.uid, "duplicate session start ignored");
                        return Ok(());
                    }
                    info!(previous_uid = %current.uid, uid = %session.uid, "session switched");
                } else {
                    info!(uid = %session.uid, "session started");
                }

                state.phase = Phase::Active(session.clone());
                let display_name = session.display_name(self.display_name_uid_chars);
                let presence = self.presence.mark_online(&session.uid, &display_name).await;
                let streams = self.ensure_streams(&mut state);
                presence.and(streams)
            }
            SessionTransition::Ended => {
                let Phase::Active(session) =
                    std::mem::replace(&mut state.phase, Phase::LoggedOut)
                else {
                    debug!("session end while logged out ignored");
                    return Ok(());
                };

                let presence = self.presence.mark_offline().await;
                self.detach_streams(&mut state);
                info!(uid = %session.uid, "session ended");
                presence
            }
        }
    }

    /// Idempotent re-entry: arm presence for the active uid if it is not
    /// armed and attach any detached stream.
    ///
    /// # Errors
    ///
    /// - `AppError::NoActiveSession` while logged out (nothing happens).
    /// - `AppError::StoreUnavailable` if re-arming or attaching fails.
    pub async fn refresh(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let Phase::Active(session) = state.phase.clone() else {
            debug!("refresh while logged out rejected");
            return Err(AppError::NoActiveSession);
        };

        let presence = if self.presence.is_armed_for(&session.uid) {
            Ok(())
        } else {
            let display_name = session.display_name(self.display_name_uid_chars);
            self.presence.mark_online(&session.uid, &display_name).await
        };
        let streams = self.ensure_streams(&mut state);
        presence.and(streams)
    }

    /// Publish a message as the signed-in user.
    ///
    /// # Errors
    ///
    /// See [`MessageStream::send`].
    pub async fn send(&self, text: &str) -> Result<String> {
        self.messages.send(text).await
    }

    /// Delete every message in the feed.
    ///
    /// # Errors
    ///
    /// - `AppError::NoActiveSession` while logged out (nothing happens).
    /// - `AppError::StoreUnavailable` if the delete fails.
    pub async fn clear(&self) -> Result<()> {
        if self.monitor.current().is_none() {
            debug!("clear while logged out rejected");
            return Err(AppError::NoActiveSession);
        }
        self.messages.clear().await
    }

    /// Explicitly remove the presence record and disarm the heartbeat.
    /// A no-op when nothing is marked online.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the delete fails.
    pub async fn set_offline(&self) -> Result<()> {
        let _state = self.state.lock().await;
        self.presence.mark_offline().await
    }

    /// Release the heartbeat and both subscriptions without writing.
    ///
    /// Returns once the heartbeat task has exited, including any write it
    /// had in flight. The presence record is left to the store's
    /// disconnect cleanup.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        let heartbeat = self.presence.disarm();
        self.detach_streams(&mut state);
        self.cancel.cancel();
        if let Some(heartbeat) = heartbeat {
            heartbeat.await_completion().await;
        }
        debug!("coordinator resources released");
    }

    /// Current phase.
    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase.clone()
    }

    /// Session most recently reported by the identity provider.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.monitor.current()
    }

    /// Receiver for the ordered message sequence.
    #[must_use]
    pub fn messages(&self) -> watch::Receiver<Vec<Message>> {
        self.messages.messages()
    }

    /// Receiver for the online roster.
    #[must_use]
    pub fn roster(&self) -> watch::Receiver<Roster> {
        self.roster.roster()
    }

    /// Presence tracker, for inspection.
    #[must_use]
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Message stream, for inspection.
    #[must_use]
    pub fn message_stream(&self) -> &MessageStream {
        &self.messages
    }

    /// Roster stream, for inspection.
    #[must_use]
    pub fn roster_stream(&self) -> &RosterStream {
        &self.roster
    }

    fn ensure_streams(&self, state: &mut CoordinatorState) -> Result<()> {
        if state.streams_attached {
            return Ok(());
        }
        self.messages.attach()?;
        self.roster.attach()?;
        state.streams_attached = true;
        Ok(())
    }

    fn detach_streams(&self, state: &mut CoordinatorState) {
        self.messages.detach();
        self.roster.detach();
        state.streams_attached = false;
    }
}
