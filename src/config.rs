//! Configuration parsing and validation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Store paths for the two feeds.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StoreConfig {
    /// Feed root holding pushed messages.
    #[serde(default = "default_messages_path")]
    pub messages_path: String,
    /// Feed root holding one presence record per online uid.
    #[serde(default = "default_presence_path")]
    pub presence_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            messages_path: default_messages_path(),
            presence_path: default_presence_path(),
        }
    }
}

/// Presence marker and heartbeat settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PresenceConfig {
    /// Interval between `lastSeen` rewrites.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Number of uid characters used as display name when a session has
    /// no email.
    #[serde(default = "default_display_name_uid_chars")]
    pub display_name_uid_chars: usize,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: default_heartbeat_interval(),
            display_name_uid_chars: default_display_name_uid_chars(),
        }
    }
}

impl PresenceConfig {
    /// Heartbeat interval as a [`Duration`].
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }
}

fn default_messages_path() -> String {
    "messages".into()
}

fn default_presence_path() -> String {
    "onlineUsers".into()
}

fn default_heartbeat_interval() -> u64 {
    60
}

fn default_display_name_uid_chars() -> usize {
    8
}

/// Top-level configuration parsed from TOML.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// Feed locations in the backing store.
    #[serde(default)]
    pub store: StoreConfig,
    /// Presence marker behavior.
    #[serde(default)]
    pub presence: PresenceConfig,
}

impl SyncConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, contains
    /// invalid TOML, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        validate_path("store.messages_path", &self.store.messages_path)?;
        validate_path("store.presence_path", &self.store.presence_path)?;

        let (messages, presence) = (&self.store.messages_path, &self.store.presence_path);
        if messages == presence {
            return Err(AppError::Config(
                "store.messages_path and store.presence_path must differ".into(),
            ));
        }
        if is_nested(messages, presence) || is_nested(presence, messages) {
            return Err(AppError::Config(
                "store.messages_path and store.presence_path must not be nested".into(),
            ));
        }

        if self.presence.heartbeat_interval_seconds == 0 {
            return Err(AppError::Config(
                "presence.heartbeat_interval_seconds must be greater than zero".into(),
            ));
        }

        if self.presence.display_name_uid_chars == 0 {
            return Err(AppError::Config(
                "presence.display_name_uid_chars must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

fn validate_path(field: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(AppError::Config(format!("{field} must not be empty")));
    }
    if path.split('/').any(str::is_empty) {
        return Err(AppError::Config(format!(
            "{field} must not contain empty segments or leading/trailing '/'"
        )));
    }
    Ok(())
}

/// Whether `inner` lies strictly below `outer`.
fn is_nested(outer: &str, inner: &str) -> bool {
    inner
        .strip_prefix(outer)
        .is_some_and(|rest| rest.starts_with('/'))
}
