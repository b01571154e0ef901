//! Ordered message feed.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::FeedSubscription;
use crate::config::SyncConfig;
use crate::gateway::{Snapshot, StoreGateway};
use crate::models::message::{Message, NewMessage};
use crate::models::now_millis;
use crate::models::session::Session;
use crate::{AppError, Result};

/// Rebuild the ordered message sequence from one feed snapshot.
///
/// Entries that fail to decode are skipped. Duplicate ids keep the last
/// entry in key order. The result is sorted by `timestamp`; the sort is
/// stable, so ties keep key order, which for store-generated ids is push
/// order.
#[must_use]
pub fn materialize_messages(snapshot: &Snapshot) -> Vec<Message> {
    let Some(entries) = snapshot.entries() else {
        if snapshot.is_present() {
            warn!("message feed snapshot is not an object; treating as empty");
        }
        return Vec::new();
    };

    let mut positions: HashMap<String, usize> = HashMap::with_capacity(entries.len());
    let mut messages: Vec<Message> = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        match Message::from_entry(key, value) {
            Ok(message) => {
                let existing = positions.get(&message.id).copied();
                if let Some(index) = existing {
                    warn!(id = %message.id, "duplicate message id in feed; keeping last");
                    messages[index] = message;
                } else {
                    positions.insert(message.id.clone(), messages.len());
                    messages.push(message);
                }
            }
            Err(err) => warn!(%key, %err, "skipping malformed message entry"),
        }
    }

    messages.sort_by_key(|message| message.timestamp);
    messages
}

/// Subscription to the message feed plus the `send`/`clear` commands.
pub struct MessageStream {
    feed: FeedSubscription<Vec<Message>>,
    gateway: Arc<dyn StoreGateway>,
    path: String,
    session: watch::Receiver<Option<Session>>,
    display_name_uid_chars: usize,
}

impl MessageStream {
    /// Build a detached stream over the configured messages path.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn StoreGateway>,
        config: &SyncConfig,
        session: watch::Receiver<Option<Session>>,
    ) -> Self {
        let path = config.store.messages_path.clone();
        Self {
            feed: FeedSubscription::new(Arc::clone(&gateway), path.clone(), materialize_messages),
            gateway,
            path,
            session,
            display_name_uid_chars: config.presence.display_name_uid_chars,
        }
    }

    /// Subscribe to the feed. A no-op while already attached.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the subscription fails.
    pub fn attach(&self) -> Result<()> {
        if self.feed.attach()? {
            info!(path = %self.path, "message stream attached");
        }
        Ok(())
    }

    /// Unsubscribe and publish an empty sequence. Idempotent.
    pub fn detach(&self) {
        if self.feed.detach() {
            info!(path = %self.path, "message stream detached");
        }
    }

    /// Whether a feed subscription is live.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.feed.is_attached()
    }

    /// Receiver for the materialized sequence.
    #[must_use]
    pub fn messages(&self) -> watch::Receiver<Vec<Message>> {
        self.feed.subscribe_view()
    }

    /// Copy of the currently published sequence.
    #[must_use]
    pub fn current(&self) -> Vec<Message> {
        self.feed.borrow_view().clone()
    }

    /// Publish `text` as the signed-in user and return the new message id.
    ///
    /// The local sequence is not touched; the message shows up once the
    /// feed delivers it.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidInput` if `text` is blank (no write happens).
    /// - `AppError::NoActiveSession` if nobody is signed in (no write happens).
    /// - `AppError::StoreUnavailable` if the publish fails.
    pub async fn send(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            debug!("blank message rejected");
            return Err(AppError::InvalidInput("message text is empty".into()));
        }
        let session = self.session.borrow().clone();
        let Some(session) = session else {
            debug!("send without session rejected");
            return Err(AppError::NoActiveSession);
        };

        let message = NewMessage::text(
            text,
            session.uid.as_str(),
            session.display_name(self.display_name_uid_chars),
            now_millis(),
        )?;
        let id = self.gateway.publish(&self.path, message.to_value()?).await?;
        debug!(%id, uid = %session.uid, "message published");
        Ok(id)
    }

    /// Delete every message in the feed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the delete fails.
    pub async fn clear(&self) -> Result<()> {
        self.gateway.write(&self.path, None).await?;
        info!(path = %self.path, "message feed cleared");
        Ok(())
    }
}
