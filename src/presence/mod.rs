//! Presence marker and liveness heartbeat.

pub mod heartbeat;
pub mod tracker;

pub use heartbeat::{Heartbeat, HeartbeatHandle};
pub use tracker::PresenceTracker;
