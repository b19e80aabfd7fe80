//! Sessions — the exclusive owners of every memory row.

use crate::error::MemoryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap a caller-supplied id, rejecting empty or blank values.
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(MemoryError::Validation("session id must not be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A single conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    /// Optional human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn blank_id_rejected() {
        assert!(SessionId::parse("").is_err());
        assert!(SessionId::parse("   ").is_err());
    }

    #[test]
    fn parse_trims_whitespace() {
        let id: SessionId = " chat-1 ".parse().unwrap();
        assert_eq!(id.as_str(), "chat-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"chat-1\"");
    }
}
