//! Backing-store capability consumed by the synchronization core.
//!
//! The [`StoreGateway`] trait is the only seam between the core and the
//! push-based store. Feed values travel as [`Snapshot`]s and subscriptions
//! are identified by opaque [`SubscriptionHandle`]s, so nothing above this
//! module handles untyped store references.

pub mod memory;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::Result;

/// Boxed future returned by asynchronous gateway operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Listener invoked with the current value of a subscribed path.
///
/// Invoked once immediately on subscribe and again after every change, in
/// the order the store emits them. Callbacks must not call back into the
/// gateway.
pub type SnapshotCallback = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// Value observed at a subscribed path.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    /// The path holds a value.
    Present(Value),
    /// Nothing is stored at the path.
    Absent,
}

impl Snapshot {
    /// Wrap an optional store value; JSON `null` counts as absent.
    #[must_use]
    pub fn from_value(value: Option<Value>) -> Self {
        match value {
            Some(Value::Null) | None => Self::Absent,
            Some(value) => Self::Present(value),
        }
    }

    /// Whether the path holds a value.
    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Keyed children, when the value is an object.
    #[must_use]
    pub fn entries(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Present(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// Opaque token identifying one live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Mint a handle from a gateway-internal identifier.
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Gateway-internal identifier.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Join a feed root and a child key into a store path.
#[must_use]
pub fn child_path(root: &str, key: &str) -> String {
    format!("{root}/{key}")
}

/// Push-based store operations used by the core.
///
/// Paths are `/`-separated. Every fallible operation reports an
/// unreachable store as [`AppError::StoreUnavailable`](crate::AppError::StoreUnavailable).
pub trait StoreGateway: Send + Sync {
    /// Append `value` under `path` and return the generated id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the store cannot be reached.
    fn publish(&self, path: &str, value: Value) -> StoreFuture<'_, String>;

    /// Observe `path`, invoking `on_snapshot` immediately and on every change.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the subscription cannot be
    /// established.
    fn subscribe(&self, path: &str, on_snapshot: SnapshotCallback) -> Result<SubscriptionHandle>;

    /// Stop deliveries for `handle`. Unknown or already-removed handles are
    /// ignored.
    fn unsubscribe(&self, handle: SubscriptionHandle);

    /// Overwrite the value at `path`, or delete it when `value` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the store cannot be reached.
    fn write(&self, path: &str, value: Option<Value>) -> StoreFuture<'_, ()>;

    /// Register a store-enforced removal of `path` for when the current
    /// connection drops.
    ///
    /// # Errors
    ///
    /// Returns `AppError::StoreUnavailable` if the registration fails.
    fn on_disconnect_remove(&self, path: &str) -> StoreFuture<'_, ()>;
}
