//! Transcript messages.
//!
//! A message is created on every conversation turn. Its importance may be
//! rewritten later by an external scoring step; nothing else about it ever
//! changes, and it is only removed when its session is deleted.

use crate::error::MemoryError;
use crate::importance::Importance;
use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            "tool" => Ok(Self::Tool),
            other => Err(MemoryError::Validation(format!("unknown role: {other:?}"))),
        }
    }
}

/// A persisted transcript turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned id, increasing in insertion order
    pub id: i64,

    /// Owning session
    pub session_id: SessionId,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub text: String,

    /// Retrieval priority
    pub importance: Importance,

    pub created_at: DateTime<Utc>,
}

/// Input for `create_message`.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: SessionId,
    pub role: Role,
    pub text: String,
    pub importance: Importance,
}

impl NewMessage {
    /// A message with the default importance (0.5).
    pub fn new(session_id: SessionId, role: Role, text: impl Into<String>) -> Self {
        Self {
            session_id,
            role,
            text: text.into(),
            importance: Importance::MESSAGE,
        }
    }

    pub fn user(session_id: SessionId, text: impl Into<String>) -> Self {
        Self::new(session_id, Role::User, text)
    }

    pub fn assistant(session_id: SessionId, text: impl Into<String>) -> Self {
        Self::new(session_id, Role::Assistant, text)
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_uses_default_importance() {
        let msg = NewMessage::user(SessionId::new(), "hello");
        assert_eq!(msg.importance, Importance::MESSAGE);
        assert_eq!(msg.role, Role::User);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!(" tool ".parse::<Role>().unwrap(), Role::Tool);
        assert!("narrator".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
    }
}
