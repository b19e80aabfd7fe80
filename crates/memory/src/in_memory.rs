//! In-memory backend — useful for testing and ephemeral sessions.
//!
//! All four stores share one `RwLock`, so context reads are served from a
//! single consistent snapshot.

use async_trait::async_trait;
use recollect_core::clock::{Clock, SystemClock};
use recollect_core::error::MemoryError;
use recollect_core::importance::Importance;
use recollect_core::message::{Message, NewMessage};
use recollect_core::pin::{NewPin, Pin, PinType};
use recollect_core::session::{Session, SessionId};
use recollect_core::store::{
    ContextInputs, ContextSource, MessageStore, PinStore, SessionStore, SummaryStore,
};
use recollect_core::summary::{NewSummary, Summary};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct State {
    sessions: Vec<Session>,
    messages: Vec<Message>,
    summaries: Vec<Summary>,
    pins: Vec<Pin>,
    // One id sequence per table, as with SQLite AUTOINCREMENT
    last_message_id: i64,
    last_summary_id: i64,
    last_pin_id: i64,
}

impl State {
    fn next_message_id(&mut self) -> i64 {
        self.last_message_id += 1;
        self.last_message_id
    }

    fn next_summary_id(&mut self) -> i64 {
        self.last_summary_id += 1;
        self.last_summary_id
    }

    fn next_pin_id(&mut self) -> i64 {
        self.last_pin_id += 1;
        self.last_pin_id
    }

    fn has_session(&self, id: &SessionId) -> bool {
        self.sessions.iter().any(|s| &s.id == id)
    }

    fn recent_messages(&self, session_id: &SessionId, limit: usize) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| &m.session_id == session_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        messages.truncate(limit);
        messages
    }

    fn top_summaries(&self, session_id: &SessionId, limit: usize) -> Vec<Summary> {
        let mut summaries: Vec<Summary> = self
            .summaries
            .iter()
            .filter(|s| &s.session_id == session_id)
            .cloned()
            .collect();
        summaries.sort_by(|a, b| {
            a.importance
                .cmp_desc(&b.importance)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        summaries.truncate(limit);
        summaries
    }

    fn pins(&self, session_id: &SessionId, pin_type: Option<PinType>) -> Vec<Pin> {
        let mut pins: Vec<Pin> = self
            .pins
            .iter()
            .filter(|p| &p.session_id == session_id)
            .filter(|p| pin_type.is_none_or(|t| p.pin_type == t))
            .cloned()
            .collect();
        pins.sort_by(|a, b| {
            a.importance
                .cmp_desc(&b.importance)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        pins
    }
}

/// An in-memory backend implementing every store trait.
pub struct InMemoryBackend {
    state: Arc<RwLock<State>>,
    clock: Arc<dyn Clock>,
    strict_sessions: bool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Use a custom time source for creation timestamps.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            clock,
            strict_sessions: true,
        }
    }

    /// When `false`, writes to an unknown session implicitly create it
    /// instead of failing with `NotFound`.
    pub fn strict_sessions(mut self, strict: bool) -> Self {
        self.strict_sessions = strict;
        self
    }

    /// Fail with `NotFound` for unknown sessions, or register them when
    /// running non-strict.
    fn ensure_session(&self, state: &mut State, id: &SessionId) -> Result<(), MemoryError> {
        if state.has_session(id) {
            return Ok(());
        }
        if self.strict_sessions {
            return Err(MemoryError::session_not_found(id.as_str()));
        }
        state.sessions.push(Session {
            id: id.clone(),
            title: None,
            created_at: self.clock.now(),
        });
        Ok(())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemoryBackend {
    async fn create_session(&self, title: Option<String>) -> Result<Session, MemoryError> {
        let session = Session {
            id: SessionId::new(),
            title,
            created_at: self.clock.now(),
        };
        self.state.write().await.sessions.push(session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, MemoryError> {
        let state = self.state.read().await;
        Ok(state.sessions.iter().find(|s| &s.id == id).cloned())
    }

    async fn delete_session(&self, id: &SessionId) -> Result<bool, MemoryError> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|s| &s.id != id);
        if state.sessions.len() == before {
            return Ok(false);
        }
        state.messages.retain(|m| &m.session_id != id);
        state.summaries.retain(|s| &s.session_id != id);
        state.pins.retain(|p| &p.session_id != id);
        debug!("Deleted session {id} and its memory");
        Ok(true)
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, MemoryError> {
        Ok(self.state.read().await.sessions.clone())
    }
}

#[async_trait]
impl MessageStore for InMemoryBackend {
    async fn create_message(&self, message: NewMessage) -> Result<Message, MemoryError> {
        let mut state = self.state.write().await;
        self.ensure_session(&mut state, &message.session_id)?;
        let stored = Message {
            id: state.next_message_id(),
            session_id: message.session_id,
            role: message.role,
            text: message.text,
            importance: message.importance,
            created_at: self.clock.now(),
        };
        state.messages.push(stored.clone());
        Ok(stored)
    }

    async fn recent_messages(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Message>, MemoryError> {
        Ok(self.state.read().await.recent_messages(session_id, limit))
    }

    async fn messages_after(
        &self,
        session_id: &SessionId,
        after_id: Option<i64>,
    ) -> Result<Vec<Message>, MemoryError> {
        let state = self.state.read().await;
        let floor = after_id.unwrap_or(i64::MIN);
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| &m.session_id == session_id && m.id > floor)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.id);
        Ok(messages)
    }

    async fn set_importance(
        &self,
        message_id: i64,
        importance: Importance,
    ) -> Result<bool, MemoryError> {
        let mut state = self.state.write().await;
        match state.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.importance = importance;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_messages(&self, session_id: &SessionId) -> Result<usize, MemoryError> {
        let state = self.state.read().await;
        Ok(state.messages.iter().filter(|m| &m.session_id == session_id).count())
    }
}

#[async_trait]
impl SummaryStore for InMemoryBackend {
    async fn create_summary(&self, summary: NewSummary) -> Result<Summary, MemoryError> {
        summary.validate()?;
        let mut state = self.state.write().await;
        self.ensure_session(&mut state, &summary.session_id)?;
        let stored = Summary {
            id: state.next_summary_id(),
            session_id: summary.session_id,
            text: summary.text,
            message_count: summary.message_count,
            start_message_id: summary.start_message_id,
            end_message_id: summary.end_message_id,
            importance: summary.importance,
            created_at: self.clock.now(),
        };
        state.summaries.push(stored.clone());
        Ok(stored)
    }

    async fn top_summaries(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<Summary>, MemoryError> {
        Ok(self.state.read().await.top_summaries(session_id, limit))
    }

    async fn list_summaries(&self, session_id: &SessionId) -> Result<Vec<Summary>, MemoryError> {
        let state = self.state.read().await;
        let mut summaries: Vec<Summary> = state
            .summaries
            .iter()
            .filter(|s| &s.session_id == session_id)
            .cloned()
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(summaries)
    }

    async fn latest_summarized_id(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<i64>, MemoryError> {
        let state = self.state.read().await;
        Ok(state
            .summaries
            .iter()
            .filter(|s| &s.session_id == session_id)
            .map(|s| s.end_message_id)
            .max())
    }
}

#[async_trait]
impl PinStore for InMemoryBackend {
    async fn create_pin(&self, pin: NewPin) -> Result<Pin, MemoryError> {
        let mut state = self.state.write().await;
        self.ensure_session(&mut state, &pin.session_id)?;
        let stored = Pin {
            id: state.next_pin_id(),
            session_id: pin.session_id,
            content: pin.content,
            source_message_id: pin.source_message_id,
            importance: pin.importance,
            pin_type: pin.pin_type,
            created_at: self.clock.now(),
        };
        state.pins.push(stored.clone());
        Ok(stored)
    }

    async fn list_pins(
        &self,
        session_id: &SessionId,
        pin_type: Option<PinType>,
    ) -> Result<Vec<Pin>, MemoryError> {
        Ok(self.state.read().await.pins(session_id, pin_type))
    }

    async fn delete_pin(&self, pin_id: i64) -> Result<bool, MemoryError> {
        let mut state = self.state.write().await;
        let before = state.pins.len();
        state.pins.retain(|p| p.id != pin_id);
        Ok(state.pins.len() < before)
    }
}

#[async_trait]
impl ContextSource for InMemoryBackend {
    async fn load_context_inputs(
        &self,
        session_id: &SessionId,
        summary_limit: usize,
        message_window: usize,
    ) -> Result<ContextInputs, MemoryError> {
        let state = self.state.read().await;
        Ok(ContextInputs {
            pins: state.pins(session_id, None),
            summaries: state.top_summaries(session_id, summary_limit),
            recent_messages: state.recent_messages(session_id, message_window),
        })
    }
}
