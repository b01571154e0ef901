//! Feed subscriptions materialized into consumer-visible views.
//!
//! Both streams share [`FeedSubscription`]: at most one live handle per
//! feed, a full rebuild of the view from every snapshot, and an empty view
//! after detach. Views are published through `tokio::sync::watch`, so
//! consumers always see the latest materialization.

pub mod messages;
pub mod roster;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::gateway::{Snapshot, SnapshotCallback, StoreGateway, SubscriptionHandle};
use crate::Result;

pub use messages::{materialize_messages, MessageStream};
pub use roster::{materialize_roster, Roster, RosterStream};

/// Attach/detach bookkeeping for one feed.
///
/// Every attach and detach bumps a generation counter. A callback only
/// publishes while its generation is current, and the check runs inside
/// the watch channel's write lock, so a delivery racing a detach can never
/// overwrite the empty view the detach published.
pub(crate) struct FeedSubscription<V> {
    gateway: Arc<dyn StoreGateway>,
    path: String,
    view: Arc<watch::Sender<V>>,
    handle: Mutex<Option<SubscriptionHandle>>,
    generation: Arc<AtomicU64>,
    materialize: fn(&Snapshot) -> V,
}

impl<V> FeedSubscription<V>
where
    V: Default + Send + Sync + 'static,
{
    pub(crate) fn new(
        gateway: Arc<dyn StoreGateway>,
        path: String,
        materialize: fn(&Snapshot) -> V,
    ) -> Self {
        let (view, _) = watch::channel(V::default());
        Self {
            gateway,
            path,
            view: Arc::new(view),
            handle: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
            materialize,
        }
    }

    /// Subscribe unless already attached. Returns `true` if a new
    /// subscription was created.
    pub(crate) fn attach(&self) -> Result<bool> {
        let mut handle = self.lock_handle();
        if handle.is_some() {
            debug!(path = %self.path, "feed already attached");
            return Ok(false);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.generation);
        let view = Arc::clone(&self.view);
        let materialize = self.materialize;
        let callback: SnapshotCallback = Arc::new(move |snapshot: Snapshot| {
            let next = materialize(&snapshot);
            view.send_if_modified(|published| {
                if current.load(Ordering::SeqCst) != generation {
                    return false;
                }
                *published = next;
                true
            });
        });

        *handle = Some(self.gateway.subscribe(&self.path, callback)?);
        debug!(path = %self.path, "feed attached");
        Ok(true)
    }

    /// Unsubscribe and publish an empty view. Returns `true` if a live
    /// subscription was removed.
    pub(crate) fn detach(&self) -> bool {
        let taken = self.lock_handle().take();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = taken {
            self.gateway.unsubscribe(handle);
            debug!(path = %self.path, "feed detached");
        }
        self.view.send_replace(V::default());
        taken.is_some()
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.lock_handle().is_some()
    }

    pub(crate) fn subscribe_view(&self) -> watch::Receiver<V> {
        self.view.subscribe()
    }

    pub(crate) fn borrow_view(&self) -> watch::Ref<'_, V> {
        self.view.borrow()
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<SubscriptionHandle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
