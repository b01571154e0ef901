//! Online marker for the signed-in user.
//!
//! The tracker owns a single presence slot: the uid currently marked
//! online and, once arming succeeded, its heartbeat. Replacing or clearing
//! the slot drops the previous heartbeat handle, which cancels that timer
//! synchronously.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use super::heartbeat::{Heartbeat, HeartbeatHandle};
use crate::config::SyncConfig;
use crate::gateway::{child_path, StoreGateway};
use crate::models::now_millis;
use crate::models::presence::PresenceRecord;
use crate::models::session::Session;
use crate::{AppError, Result};

struct PresenceSlot {
    uid: String,
    heartbeat: Option<HeartbeatHandle>,
}

/// Writes, refreshes and removes the current user's presence record.
pub struct PresenceTracker {
    gateway: Arc<dyn StoreGateway>,
    presence_path: String,
    interval: Duration,
    session: watch::Receiver<Option<Session>>,
    cancel: CancellationToken,
    slot: Mutex<Option<PresenceSlot>>,
}

impl PresenceTracker {
    /// Build a tracker. Heartbeats run under child tokens of `cancel`.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn StoreGateway>,
        config: &SyncConfig,
        session: watch::Receiver<Option<Session>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            presence_path: config.store.presence_path.clone(),
            interval: config.presence.heartbeat_interval(),
            session,
            cancel,
            slot: Mutex::new(None),
        }
    }

    /// Store path of `uid`'s presence record.
    #[must_use]
    pub fn record_path(&self, uid: &str) -> String {
        child_path(&self.presence_path, uid)
    }

    /// Write an online record for `uid`, register its disconnect cleanup
    /// and arm the heartbeat.
    ///
    /// Any timer armed for a previous uid is cancelled before the first
    /// write; that uid's record is left to its own disconnect cleanup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the record write or the
    /// disconnect registration fails. The heartbeat is not armed in that
    /// case.
    pub async fn mark_online(&self, uid: &str, display_name: &str) -> Result<()> {
        let path = self.record_path(uid);
        let span = info_span!("mark_online", uid);

        async move {
            let superseded = self.lock_slot().replace(PresenceSlot {
                uid: uid.to_owned(),
                heartbeat: None,
            });
            if let Some(previous) = superseded.filter(|previous| previous.uid != uid) {
                info!(previous_uid = %previous.uid, "presence superseded");
            }

            let record = PresenceRecord::online(uid, display_name, now_millis());
            self.gateway.write(&path, Some(record.to_value()?)).await?;
            self.gateway.on_disconnect_remove(&path).await?;

            let heartbeat = Heartbeat::new(
                uid.to_owned(),
                child_path(&path, "lastSeen"),
                self.interval,
                Arc::clone(&self.gateway),
                self.session.clone(),
                self.cancel.child_token(),
            )
            .spawn();

            let mut slot = self.lock_slot();
            match slot.as_mut() {
                Some(current) if current.uid == uid && current.heartbeat.is_none() => {
                    current.heartbeat = Some(heartbeat);
                    info!(%path, "presence marked online");
                }
                // Superseded or already armed while the writes were in flight.
                _ => debug!("presence slot changed during arming; heartbeat discarded"),
            }
            Ok::<(), AppError>(())
        }
        .instrument(span)
        .await
    }

    /// Remove the current record and disarm the heartbeat. A no-op when no
    /// uid is marked online.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the delete fails; the
    /// heartbeat is disarmed regardless.
    pub async fn mark_offline(&self) -> Result<()> {
        let Some(PresenceSlot { uid, heartbeat }) = self.lock_slot().take() else {
            debug!("no presence to clear");
            return Ok(());
        };
        drop(heartbeat);

        self.gateway.write(&self.record_path(&uid), None).await?;
        info!(%uid, "presence marked offline");
        Ok(())
    }

    /// Disarm the heartbeat without writing, leaving the record to the
    /// store's disconnect cleanup.
    ///
    /// The timer is cancelled before this returns. The handle is handed
    /// back so the caller can wait for a write that was already in flight.
    #[must_use = "dropping the handle does not wait for an in-flight write"]
    pub fn disarm(&self) -> Option<HeartbeatHandle> {
        let slot = self.lock_slot().take()?;
        debug!(uid = %slot.uid, "presence disarmed");
        let heartbeat = slot.heartbeat?;
        heartbeat.cancel();
        Some(heartbeat)
    }

    /// Whether a heartbeat is armed for `uid`.
    #[must_use]
    pub fn is_armed_for(&self, uid: &str) -> bool {
        self.lock_slot()
            .as_ref()
            .is_some_and(|slot| slot.uid == uid && slot.heartbeat.is_some())
    }

    /// Uid whose heartbeat is armed, if any.
    #[must_use]
    pub fn armed_uid(&self) -> Option<String> {
        self.lock_slot()
            .as_ref()
            .filter(|slot| slot.heartbeat.is_some())
            .map(|slot| slot.uid.clone())
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<PresenceSlot>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
