use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};

/// Display label for a session with no attached document.
pub const GENERAL_CHAT_LABEL: &str = "General Chat";

/// Longest session id accepted as a storage key.
pub const MAX_SESSION_ID_LEN: usize = 128;

// =============================================================================
// Session identifiers
// =============================================================================

/// Opaque session identifier.
///
/// Ids double as file names for index artifacts, so only ASCII
/// alphanumerics, `-` and `_` are accepted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Validate and wrap a raw identifier.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FolioError::Validation("session id must not be empty".into()));
        }
        if raw.len() > MAX_SESSION_ID_LEN {
            return Err(FolioError::Validation(format!(
                "session id exceeds {} characters",
                MAX_SESSION_ID_LEN
            )));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(FolioError::Validation(format!(
                "session id contains invalid characters: {}",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single entry in a session's chat history. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}
