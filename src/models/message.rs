//! Chat message model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AppError, Result};

/// Message classification as stored in the `type` field.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Regular user-authored text.
    #[default]
    Text,
    /// Notice generated by the system rather than a participant.
    System,
}

/// A message materialized from the feed.
///
/// `id` is the store-assigned key unless the stored body carries its own
/// `id` field, in which case that value wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Identity of the message within the feed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Message body; never blank.
    pub text: String,
    /// Uid of the author.
    pub sender_id: String,
    /// Author display name at send time.
    pub sender_name: String,
    /// Send time in epoch milliseconds.
    pub timestamp: i64,
    /// Text or system notice.
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

impl Message {
    /// Decode one feed entry stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if the entry does not decode or its
    /// text is blank.
    pub fn from_entry(key: &str, value: &Value) -> Result<Self> {
        let mut message: Self = serde_json::from_value(value.clone())?;
        if message.id.is_empty() {
            key.clone_into(&mut message.id);
        }
        if message.text.trim().is_empty() {
            return Err(AppError::InvalidInput(format!(
                "message {} has blank text",
                message.id
            )));
        }
        Ok(message)
    }

    /// Whether the message was authored by `uid`.
    #[must_use]
    pub fn is_from(&self, uid: &str) -> bool {
        self.sender_id == uid
    }
}

/// Message body published to the feed; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    /// Trimmed message body.
    pub text: String,
    /// Uid of the author.
    pub sender_id: String,
    /// Author display name.
    pub sender_name: String,
    /// Send time in epoch milliseconds.
    pub timestamp: i64,
    /// Text or system notice.
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl NewMessage {
    /// Build a text message, trimming `text`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if `text` is blank after trimming.
    pub fn text(
        text: &str,
        sender_id: impl Into<String>,
        sender_name: impl Into<String>,
        timestamp: i64,
    ) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidInput("message text is empty".into()));
        }
        Ok(Self {
            text: trimmed.to_owned(),
            sender_id: sender_id.into(),
            sender_name: sender_name.into(),
            timestamp,
            kind: MessageKind::Text,
        })
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
