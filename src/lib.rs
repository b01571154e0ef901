#![forbid(unsafe_code)]

//! Presence-aware synchronization core for a real-time message feed and an
//! online roster.

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod gateway;
pub mod identity;
pub mod models;
pub mod presence;
pub mod streams;

pub use config::SyncConfig;
pub use coordinator::{LifecycleCoordinator, Phase};
pub use errors::{AppError, Result};
