//! Error types for the recollect domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! [`MemoryError`] distinguishes caller mistakes (validation, missing
//! sessions) from persistence failures.

use thiserror::Error;

/// Errors raised by the message, summary, pin, and session stores and by
/// context assembly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MemoryError {
    /// Invalid input: importance outside `[0, 1]`, empty session id,
    /// unknown pin type, inverted message range.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

impl MemoryError {
    /// Shorthand for a missing session.
    pub fn session_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Session",
            id: id.into(),
        }
    }

    /// Whether the error was caused by the caller rather than the store.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound { .. })
    }
}
