//! Periodic `lastSeen` refresh bound to exactly one uid.
//!
//! A [`Heartbeat`] owns its target uid and the store path it rewrites.
//! [`spawn`](Heartbeat::spawn) starts the timer task and returns a
//! [`HeartbeatHandle`]; dropping the handle cancels the task, so replacing
//! the handle in its slot is the one and only way to re-arm.
//!
//! Each tick checks that the session still belongs to the armed uid and
//! then writes. The check and the write straddle an await on the store, so
//! a tick that passed the check just before its handle was dropped still
//! completes that one write. Cancellation is observed before every check,
//! which keeps that window down to a single in-flight write.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use crate::gateway::StoreGateway;
use crate::models::now_millis;
use crate::models::session::Session;

/// Builder for a heartbeat timer.
pub struct Heartbeat {
    uid: String,
    last_seen_path: String,
    interval: Duration,
    gateway: Arc<dyn StoreGateway>,
    session: watch::Receiver<Option<Session>>,
    cancel: CancellationToken,
}

impl Heartbeat {
    /// Construct a heartbeat (does not start the timer yet).
    #[must_use]
    pub fn new(
        uid: String,
        last_seen_path: String,
        interval: Duration,
        gateway: Arc<dyn StoreGateway>,
        session: watch::Receiver<Option<Session>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            uid,
            last_seen_path,
            interval,
            gateway,
            session,
            cancel,
        }
    }

    /// Spawn the timer task. The first write happens one interval from now.
    #[must_use]
    pub fn spawn(self) -> HeartbeatHandle {
        let uid = self.uid.clone();
        let cancel = self.cancel.clone();
        let span = info_span!("heartbeat", uid = %self.uid);
        let join_handle = tokio::spawn(self.run().instrument(span));

        HeartbeatHandle {
            uid,
            join_handle: Some(join_handle),
            cancel,
        }
    }

    async fn run(self) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("heartbeat cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if self.cancel.is_cancelled() {
                return;
            }
            if !self.owns_session() {
                debug!("session no longer matches armed uid; tick skipped");
                continue;
            }

            // Not raced against cancellation: an issued write is never
            // abandoned half way.
            let result = self
                .gateway
                .write(&self.last_seen_path, Some(Value::from(now_millis())))
                .await;
            match result {
                Ok(()) => debug!("last seen refreshed"),
                Err(err) => warn!(%err, "heartbeat write failed; retrying next tick"),
            }
        }
    }

    fn owns_session(&self) -> bool {
        self.session
            .borrow()
            .as_ref()
            .is_some_and(|session| session.uid == self.uid)
    }
}

/// Handle returned from [`Heartbeat::spawn`]; cancels the timer on drop.
pub struct HeartbeatHandle {
    uid: String,
    join_handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl HeartbeatHandle {
    /// Uid this timer refreshes.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Stop the timer. A write already in flight still completes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel the timer and wait for the task to exit, including any write
    /// already in flight.
    pub async fn await_completion(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
