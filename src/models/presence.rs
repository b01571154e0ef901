//! Online roster entry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Presence marker for one signed-in uid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    /// Owning uid; falls back to the entry key when absent from the body.
    #[serde(default)]
    pub uid: String,
    /// Name shown in the roster.
    pub display_name: String,
    /// Always `true` for records written by this crate.
    #[serde(default)]
    pub is_online: bool,
    /// Last heartbeat, epoch milliseconds.
    #[serde(default)]
    pub last_seen: i64,
}

impl PresenceRecord {
    /// Fresh online marker stamped with `now`.
    #[must_use]
    pub fn online(uid: impl Into<String>, display_name: impl Into<String>, now: i64) -> Self {
        Self {
            uid: uid.into(),
            display_name: display_name.into(),
            is_online: true,
            last_seen: now,
        }
    }

    /// Decode one roster entry stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if the entry does not decode.
    pub fn from_entry(key: &str, value: &Value) -> Result<Self> {
        let mut record: Self = serde_json::from_value(value.clone())?;
        if record.uid.is_empty() {
            key.clone_into(&mut record.uid);
        }
        Ok(record)
    }

    /// Encode as the JSON value written to the store.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if serialization fails.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}
