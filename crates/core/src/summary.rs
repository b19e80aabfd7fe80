//! Summaries — condensed replacements for ranges of older messages.
//!
//! A summary never deletes the messages it covers; the raw history stays in
//! the message store and the summary only saves budget at assembly time.

use crate::error::MemoryError;
use crate::importance::Importance;
use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub id: i64,
    pub session_id: SessionId,

    /// The condensed text produced by the language model
    pub text: String,

    /// How many messages this summary stands in for
    pub message_count: i64,

    /// First message id covered (inclusive)
    pub start_message_id: i64,

    /// Last message id covered (inclusive)
    pub end_message_id: i64,

    pub importance: Importance,
    pub created_at: DateTime<Utc>,
}

/// Input for `create_summary`.
#[derive(Debug, Clone)]
pub struct NewSummary {
    pub session_id: SessionId,
    pub text: String,
    pub message_count: i64,
    pub start_message_id: i64,
    pub end_message_id: i64,
    pub importance: Importance,
}

impl NewSummary {
    /// A summary over the closed id range `[start, end]` with
    /// `message_count = end - start + 1` and the default importance (0.7).
    pub fn for_range(session_id: SessionId, text: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            session_id,
            text: text.into(),
            message_count: end - start + 1,
            start_message_id: start,
            end_message_id: end,
            importance: Importance::SUMMARY,
        }
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    /// Reject inverted ranges and non-positive counts.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.start_message_id > self.end_message_id {
            return Err(MemoryError::Validation(format!(
                "summary range is inverted: start {} > end {}",
                self.start_message_id, self.end_message_id
            )));
        }
        if self.message_count < 1 {
            return Err(MemoryError::Validation(format!(
                "message_count must be positive, got {}",
                self.message_count
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_range_counts_inclusively() {
        let s = NewSummary::for_range(SessionId::new(), "recap", 10, 19);
        assert_eq!(s.message_count, 10);
        assert_eq!(s.importance, Importance::SUMMARY);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn single_message_range_is_valid() {
        let s = NewSummary::for_range(SessionId::new(), "one", 7, 7);
        assert_eq!(s.message_count, 1);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn inverted_range_rejected() {
        let s = NewSummary::for_range(SessionId::new(), "bad", 9, 3);
        assert!(matches!(s.validate(), Err(MemoryError::Validation(_))));
    }
}
