//! Online roster feed.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use super::FeedSubscription;
use crate::config::SyncConfig;
use crate::gateway::{Snapshot, StoreGateway};
use crate::models::presence::PresenceRecord;
use crate::Result;

/// Online participants keyed by uid. Iteration order is unspecified.
pub type Roster = HashMap<String, PresenceRecord>;

/// Rebuild the roster from one feed snapshot.
///
/// Entries that fail to decode (including bare `lastSeen` leftovers with no
/// display name) are skipped; a repeated uid keeps the last entry.
#[must_use]
pub fn materialize_roster(snapshot: &Snapshot) -> Roster {
    let Some(entries) = snapshot.entries() else {
        if snapshot.is_present() {
            warn!("roster snapshot is not an object; treating as empty");
        }
        return Roster::new();
    };

    let mut roster = Roster::with_capacity(entries.len());
    for (key, value) in entries {
        match PresenceRecord::from_entry(key, value) {
            Ok(record) => {
                roster.insert(record.uid.clone(), record);
            }
            Err(err) => warn!(%key, %err, "skipping malformed roster entry"),
        }
    }
    roster
}

/// Subscription to the online roster.
pub struct RosterStream {
    feed: FeedSubscription<Roster>,
    path: String,
}

impl RosterStream {
    /// Build a detached stream over the configured presence path.
    #[must_use]
    pub fn new(gateway: Arc<dyn StoreGateway>, config: &SyncConfig) -> Self {
        let path = config.store.presence_path.clone();
        Self {
            feed: FeedSubscription::new(gateway, path.clone(), materialize_roster),
            path,
        }
    }

    /// Subscribe to the roster. A no-op while already attached.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the subscription fails.
    pub fn attach(&self) -> Result<()> {
        if self.feed.attach()? {
            info!(path = %self.path, "roster stream attached");
        }
        Ok(())
    }

    /// Unsubscribe and publish an empty roster. Idempotent.
    pub fn detach(&self) {
        if self.feed.detach() {
            info!(path = %self.path, "roster stream detached");
        }
    }

    /// Whether a roster subscription is live.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.feed.is_attached()
    }

    /// Receiver for the materialized roster.
    #[must_use]
    pub fn roster(&self) -> watch::Receiver<Roster> {
        self.feed.subscribe_view()
    }

    /// Copy of the currently published roster.
    #[must_use]
    pub fn current(&self) -> Roster {
        self.feed.borrow_view().clone()
    }
}
