//! Store traits — the repositories the memory engine is built from.
//!
//! Each trait covers one entity. Implementations: SQLite and in-memory
//! (for tests and ephemeral sessions), both in `recollect-memory`.
//!
//! Every row belongs to exactly one session. Deleting a session removes all
//! of its messages, summaries and pins.

use crate::error::MemoryError;
use crate::importance::Importance;
use crate::message::{Message, NewMessage};
use crate::pin::{NewPin, Pin, PinType};
use crate::session::{Session, SessionId};
use crate::summary::{NewSummary, Summary};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session with a generated id.
    async fn create_session(&self, title: Option<String>) -> Result<Session, MemoryError>;

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, MemoryError>;

    /// Delete a session and every message, summary and pin it owns.
    /// Returns `false` if the session did not exist.
    async fn delete_session(&self, id: &SessionId) -> Result<bool, MemoryError>;

    /// All sessions, oldest first.
    async fn list_sessions(&self) -> Result<Vec<Session>, MemoryError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create_message(&self, message: NewMessage) -> Result<Message, MemoryError>;

    /// Up to `limit` most recent messages, newest first.
    async fn recent_messages(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Message>, MemoryError>;

    /// Messages with id greater than `after_id` (all when `None`), oldest first.
    async fn messages_after(
        &self,
        session_id: &SessionId,
        after_id: Option<i64>,
    ) -> Result<Vec<Message>, MemoryError>;

    /// Rewrite a message's importance (the external scoring step's write path).
    /// Returns `false` if the message does not exist.
    async fn set_importance(&self, message_id: i64, importance: Importance)
    -> Result<bool, MemoryError>;

    async fn count_messages(&self, session_id: &SessionId) -> Result<usize, MemoryError>;
}

#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn create_summary(&self, summary: NewSummary) -> Result<Summary, MemoryError>;

    /// Up to `limit` summaries by importance descending, then creation
    /// time ascending.
    async fn top_summaries(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Summary>, MemoryError>;

    /// Every summary of the session in creation order.
    async fn list_summaries(&self, session_id: &SessionId) -> Result<Vec<Summary>, MemoryError>;

    /// The highest `end_message_id` covered by any summary.
    async fn latest_summarized_id(&self, session_id: &SessionId)
    -> Result<Option<i64>, MemoryError>;
}

#[async_trait]
pub trait PinStore: Send + Sync {
    async fn create_pin(&self, pin: NewPin) -> Result<Pin, MemoryError>;

    /// Pins of the session (optionally of one type) by importance descending.
    async fn list_pins(
        &self,
        session_id: &SessionId,
        pin_type: Option<PinType>,
    ) -> Result<Vec<Pin>, MemoryError>;

    /// Returns `false` if the pin did not exist.
    async fn delete_pin(&self, pin_id: i64) -> Result<bool, MemoryError>;
}

/// Raw material for one context assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextInputs {
    /// All pins, importance descending.
    pub pins: Vec<Pin>,
    /// Top summaries, importance descending then oldest first.
    pub summaries: Vec<Summary>,
    /// The most recent messages, newest first.
    pub recent_messages: Vec<Message>,
}

/// The three reads context assembly needs, fetched together.
///
/// Backends that can should serve them from one snapshot so a context never
/// mixes state from different instants.
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn load_context_inputs(
        &self,
        session_id: &SessionId,
        summary_limit: usize,
        message_window: usize,
    ) -> Result<ContextInputs, MemoryError>;
}
