//! Pins — facts that are always recalled and never budget-truncated.
//!
//! Pins are append-only: they can be created and deleted but never edited.

use crate::error::MemoryError;
use crate::importance::Importance;
use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a pin came to exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinType {
    /// Explicitly pinned by the user
    #[default]
    User,
    /// Flagged by automatic content detection
    Auto,
    /// A code snippet worth keeping verbatim
    Code,
    /// A named concept or definition
    Concept,
    /// Injected by the system
    System,
}

impl PinType {
    pub const ALL: [PinType; 5] = [
        PinType::User,
        PinType::Auto,
        PinType::Code,
        PinType::Concept,
        PinType::System,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Auto => "auto",
            Self::Code => "code",
            Self::Concept => "concept",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for PinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PinType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| MemoryError::Validation(format!("malformed pin_type: {s:?}")))
    }
}

/// A persisted pin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: i64,
    pub session_id: SessionId,
    pub content: String,

    /// The message this pin was extracted from, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_message_id: Option<i64>,

    pub importance: Importance,
    pub pin_type: PinType,
    pub created_at: DateTime<Utc>,
}

/// Input for `create_pin`.
#[derive(Debug, Clone)]
pub struct NewPin {
    pub session_id: SessionId,
    pub content: String,
    pub source_message_id: Option<i64>,
    pub importance: Importance,
    pub pin_type: PinType,
}

impl NewPin {
    /// A user pin with the default importance (0.8).
    pub fn new(session_id: SessionId, content: impl Into<String>) -> Self {
        Self {
            session_id,
            content: content.into(),
            source_message_id: None,
            importance: Importance::PIN,
            pin_type: PinType::User,
        }
    }

    pub fn with_type(mut self, pin_type: PinType) -> Self {
        self.pin_type = pin_type;
        self
    }

    pub fn with_source(mut self, message_id: i64) -> Self {
        self.source_message_id = Some(message_id);
        self
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
    fn defaults_match_user_pin() {
        let pin = NewPin::new(SessionId::new(), "prefers tabs");
        assert_eq!(pin.pin_type, PinType::User);
        assert_eq!(pin.importance, Importance::PIN);
        assert!(pin.source_message_id.is_none());
    }

    #[test]
    fn pin_type_round_trips_through_str() {
        for t in PinType::ALL {
            assert_eq!(t.as_str().parse::<PinType>().unwrap(), t);
        }
    }

    #[test]
    fn pin_type_parsing_ignores_case_and_padding() {
        assert_eq!("Code".parse::<PinType>().unwrap(), PinType::Code);
        assert_eq!(" CONCEPT ".parse::<PinType>().unwrap(), PinType::Concept);
    }

    #[test]
    fn malformed_pin_type_rejected() {
        let err = "snippet".parse::<PinType>().unwrap_err();
        assert!(matches!(err, MemoryError::Validation(_)));
        assert!("".parse::<PinType>().is_err());
    }
}
