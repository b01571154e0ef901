//! Identity provider capability and session transition monitoring.
//!
//! The provider reports raw session observations, possibly repeated.
//! [`SessionMonitor`] turns them into de-duplicated
//! [`SessionTransition`](crate::models::session::SessionTransition)s.

pub mod local;
pub mod monitor;

use std::sync::Arc;

use crate::models::session::Session;

pub use local::LocalIdentity;
pub use monitor::{SessionMonitor, TransitionFilter};

/// Listener invoked with the current session, or `None` when signed out.
pub type SessionCallback = Arc<dyn Fn(Option<Session>) + Send + Sync>;

/// Token returned by [`IdentityProvider::on_session_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Mint an id from a provider-internal identifier.
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Provider-internal identifier.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// External identity provider.
///
/// Providers deliver at least one observation per transition and may
/// repeat themselves; suppressing duplicates is the monitor's job.
pub trait IdentityProvider: Send + Sync {
    /// Register `callback`; it receives the current session immediately and
    /// again whenever the provider observes a change.
    fn on_session_change(&self, callback: SessionCallback) -> ListenerId;

    /// Deregister a listener. Unknown ids are ignored.
    fn remove_listener(&self, id: ListenerId);
}
