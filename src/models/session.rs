//! Session model and transition events.

use serde::{Deserialize, Serialize};

/// An authenticated session as reported by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Stable user identifier.
    pub uid: String,
    /// Sign-in email, if the provider exposes one.
    pub email: Option<String>,
}

impl Session {
    /// Session without an email.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
        }
    }

    /// Session with an email.
    #[must_use]
    pub fn with_email(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: Some(email.into()),
        }
    }

    /// Name shown to other participants.
    ///
    /// The local part of the email (before `@`); without a usable email,
    /// the first `uid_chars` characters of the uid.
    #[must_use]
    pub fn display_name(&self, uid_chars: usize) -> String {
        if let Some(local) = self
            .email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|local| !local.is_empty())
        {
            return local.to_owned();
        }
        self.uid.chars().take(uid_chars).collect()
    }
}

/// De-duplicated session lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTransition {
    /// A session for a (new) uid became active.
    Started(Session),
    /// The active session ended.
    Ended,
}

impl SessionTransition {
    /// Uid carried by a `Started` transition.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        match self {
            Self::Started(session) => Some(&session.uid),
            Self::Ended => None,
        }
    }
}
