//! Error types shared across the synchronization core.

use std::fmt::{Display, Formatter};

/// Shared result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure modes surfaced by the synchronization core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// A publish, write, subscribe or disconnect registration could not
    /// reach the backing store.
    StoreUnavailable(String),
    /// A command was issued while no session is active.
    NoActiveSession,
    /// Caller-supplied input was rejected (e.g. blank message text).
    InvalidInput(String),
    /// Configuration parsing or validation failure.
    Config(String),
    /// Console or file-system I/O failure.
    Io(String),
}

impl AppError {
    /// Whether this is a local soft rejection rather than a store failure.
    ///
    /// Soft rejections never touch the store and are not worth reporting
    /// above `debug` level.
    #[must_use]
    pub fn is_soft_rejection(&self) -> bool {
        matches!(self, Self::NoActiveSession | Self::InvalidInput(_))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreUnavailable(msg) => write!(f, "store unavailable: {msg}"),
            Self::NoActiveSession => write!(f, "no active session"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("unencodable value: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
