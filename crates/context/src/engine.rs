//! The memory engine facade.
//!
//! Bundles the four stores, the context assembler, the summarization
//! trigger and a pin detector behind one handle. Every operation honors a
//! [`CancellationToken`] and a deadline.

use crate::assembler::{AssembledContext, ContextAssembler};
use crate::detector::{HeuristicPinDetector, PinDetector};
use crate::selection::policy_from_name;
use crate::summarizer::{
    PendingRange, SummarizationPolicy, SummarizationTrigger, SummaryGenerator,
};
use recollect_config::{AppConfig, ConfigError};
use recollect_core::error::MemoryError;
use recollect_core::importance::Importance;
use recollect_core::message::{Message, NewMessage};
use recollect_core::pin::{NewPin, Pin, PinType};
use recollect_core::session::{Session, SessionId};
use recollect_core::store::{ContextSource, MessageStore, PinStore, SessionStore, SummaryStore};
use recollect_core::summary::{NewSummary, Summary};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default deadline for one engine operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A stored message together with the pins detected in it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTurn {
    pub message: Message,
    pub pins: Vec<Pin>,
}

pub struct MemoryEngine {
    sessions: Arc<dyn SessionStore>,
    messages: Arc<dyn MessageStore>,
    summaries: Arc<dyn SummaryStore>,
    pins: Arc<dyn PinStore>,
    assembler: ContextAssembler,
    trigger: SummarizationTrigger,
    detector: Arc<dyn PinDetector>,
    timeout: Duration,
    token_limit: i64,
}

impl MemoryEngine {
    /// An engine over one backend with default assembly and summarization
    /// settings.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: SessionStore + MessageStore + SummaryStore + PinStore + ContextSource + 'static,
    {
        Self {
            sessions: backend.clone(),
            messages: backend.clone(),
            summaries: backend.clone(),
            pins: backend.clone(),
            assembler: ContextAssembler::new(backend.clone()),
            trigger: SummarizationTrigger::new(
                backend.clone(),
                backend,
                SummarizationPolicy::default(),
            ),
            detector: Arc::new(HeuristicPinDetector::default()),
            timeout: DEFAULT_TIMEOUT,
            token_limit: crate::assembler::DEFAULT_TOKEN_LIMIT,
        }
    }

    /// An engine over one backend configured from `config`.
    pub fn from_config<B>(backend: Arc<B>, config: &AppConfig) -> Result<Self, ConfigError>
    where
        B: SessionStore + MessageStore + SummaryStore + PinStore + ContextSource + 'static,
    {
        config.validate()?;
        let policy = policy_from_name(&config.context.selection_policy).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "unknown selection policy '{}'",
                config.context.selection_policy
            ))
        })?;

        let assembler = ContextAssembler::new(backend.clone())
            .with_policy(policy)
            .with_limits(config.context.summary_limit, config.context.message_window);
        let summarization = SummarizationPolicy {
            threshold: config.summarization.threshold,
            keep_recent: config.summarization.keep_recent,
            importance: config.summarization_importance()?,
        };

        let mut engine = Self::from_backend(backend.clone());
        engine.assembler = assembler;
        engine.trigger = SummarizationTrigger::new(backend.clone(), backend, summarization);
        engine.timeout = Duration::from_millis(config.context.timeout_ms);
        engine.token_limit = config.context.token_limit;
        Ok(engine)
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn PinDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Budget used when a caller does not pass one.
    pub fn token_limit(&self) -> i64 {
        self.token_limit
    }

    pub fn summarization_policy(&self) -> &SummarizationPolicy {
        self.trigger.policy()
    }

    // ── Sessions ──────────────────────────────────────────────────────────

    pub async fn create_session(
        &self,
        title: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Session, MemoryError> {
        self.guarded(cancel, self.sessions.create_session(title)).await
    }

    pub async fn get_session(
        &self,
        id: &SessionId,
        cancel: &CancellationToken,
    ) -> Result<Option<Session>, MemoryError> {
        self.guarded(cancel, self.sessions.get_session(id)).await
    }

    pub async fn list_sessions(&self, cancel: &CancellationToken) -> Result<Vec<Session>, MemoryError> {
        self.guarded(cancel, self.sessions.list_sessions()).await
    }

    /// Delete a session with all of its messages, summaries and pins.
    pub async fn delete_session(
        &self,
        id: &SessionId,
        cancel: &CancellationToken,
    ) -> Result<bool, MemoryError> {
        self.guarded(cancel, self.sessions.delete_session(id)).await
    }

    // ── Writes ────────────────────────────────────────────────────────────

    pub async fn create_message(
        &self,
        message: NewMessage,
        cancel: &CancellationToken,
    ) -> Result<Message, MemoryError> {
        self.guarded(cancel, self.messages.create_message(message)).await
    }

    /// Store a message and pin whatever the detector finds in it.
    ///
    /// Detected pins reference the stored message. A failed pin write is
    /// logged and skipped; the message itself is already persisted. The
    /// deadline covers the message and all of its pins together.
    pub async fn record_turn(
        &self,
        message: NewMessage,
        cancel: &CancellationToken,
    ) -> Result<RecordedTurn, MemoryError> {
        self.guarded(cancel, self.store_turn(message)).await
    }

    async fn store_turn(&self, message: NewMessage) -> Result<RecordedTurn, MemoryError> {
        let message = self.messages.create_message(message).await?;

        let mut pins = Vec::new();
        for detected in self.detector.detect(&message) {
            let new_pin = NewPin::new(message.session_id.clone(), detected.content)
                .with_type(detected.pin_type)
                .with_source(message.id)
                .with_importance(detected.importance);
            match self.pins.create_pin(new_pin).await {
                Ok(pin) => pins.push(pin),
                Err(e) => warn!(
                    message_id = message.id,
                    error = %e,
                    "Failed to store detected pin"
                ),
            }
        }

        if !pins.is_empty() {
            debug!(message_id = message.id, pins = pins.len(), "Auto-pinned content");
        }
        Ok(RecordedTurn { message, pins })
    }

    /// Up to `limit` most recent messages, newest first.
    pub async fn recent_messages(
        &self,
        session_id: &SessionId,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>, MemoryError> {
        self.guarded(cancel, self.messages.recent_messages(session_id, limit))
            .await
    }

    pub async fn count_messages(
        &self,
        session_id: &SessionId,
        cancel: &CancellationToken,
    ) -> Result<usize, MemoryError> {
        self.guarded(cancel, self.messages.count_messages(session_id))
            .await
    }

    pub async fn set_importance(
        &self,
        message_id: i64,
        importance: Importance,
        cancel: &CancellationToken,
    ) -> Result<bool, MemoryError> {
        self.guarded(cancel, self.messages.set_importance(message_id, importance))
            .await
    }

    pub async fn create_summary(
        &self,
        summary: NewSummary,
        cancel: &CancellationToken,
    ) -> Result<Summary, MemoryError> {
        self.guarded(cancel, self.summaries.create_summary(summary))
            .await
    }

    pub async fn list_summaries(
        &self,
        session_id: &SessionId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Summary>, MemoryError> {
        self.guarded(cancel, self.summaries.list_summaries(session_id))
            .await
    }

    pub async fn create_pin(
        &self,
        pin: NewPin,
        cancel: &CancellationToken,
    ) -> Result<Pin, MemoryError> {
        self.guarded(cancel, self.pins.create_pin(pin)).await
    }

    pub async fn list_pins(
        &self,
        session_id: &SessionId,
        pin_type: Option<PinType>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Pin>, MemoryError> {
        self.guarded(cancel, self.pins.list_pins(session_id, pin_type))
            .await
    }

    pub async fn delete_pin(
        &self,
        pin_id: i64,
        cancel: &CancellationToken,
    ) -> Result<bool, MemoryError> {
        self.guarded(cancel, self.pins.delete_pin(pin_id)).await
    }

    // ── Context ───────────────────────────────────────────────────────────

    /// Build the context for `session_id` under `token_limit` (the engine
    /// default when `None`).
    ///
    /// Fails with [`MemoryError::Cancelled`] once `cancel` fires and with
    /// [`MemoryError::Timeout`] when the deadline passes first.
    pub async fn build_context(
        &self,
        session_id: &SessionId,
        token_limit: Option<i64>,
        cancel: &CancellationToken,
    ) -> Result<AssembledContext, MemoryError> {
        let limit = token_limit.unwrap_or(self.token_limit);
        self.guarded(cancel, self.assembler.build_context(session_id, limit))
            .await
    }

    /// Like [`build_context`](Self::build_context), but a failure yields an
    /// empty context flagged `degraded` instead of an error.
    pub async fn context_or_empty(
        &self,
        session_id: &SessionId,
        token_limit: Option<i64>,
        cancel: &CancellationToken,
    ) -> AssembledContext {
        let limit = token_limit.unwrap_or(self.token_limit);
        match self.build_context(session_id, Some(limit), cancel).await {
            Ok(context) => context,
            Err(e) => {
                warn!(
                    session = %session_id,
                    error = %e,
                    "Context assembly failed, continuing with empty context"
                );
                AssembledContext::degraded(session_id.clone(), limit)
            }
        }
    }

    // ── Summarization ─────────────────────────────────────────────────────

    /// Summarize the session's uncompressed messages if it is due.
    pub async fn maybe_summarize(
        &self,
        session_id: &SessionId,
        generator: &dyn SummaryGenerator,
        cancel: &CancellationToken,
    ) -> Result<Option<Summary>, MemoryError> {
        self.guarded(cancel, self.trigger.run(session_id, generator))
            .await
    }

    /// The message range that is due for summarization, if any.
    pub async fn pending_summary(
        &self,
        session_id: &SessionId,
        cancel: &CancellationToken,
    ) -> Result<Option<PendingRange>, MemoryError> {
        self.guarded(cancel, self.trigger.pending(session_id)).await
    }

    /// Record an externally produced summary of `start_id..=end_id`.
    pub async fn record_summary(
        &self,
        session_id: &SessionId,
        start_id: i64,
        end_id: i64,
        text: impl Into<String>,
        importance: Option<Importance>,
        cancel: &CancellationToken,
    ) -> Result<Summary, MemoryError> {
        let work = self
            .trigger
            .record_summary(session_id, start_id, end_id, text, importance);
        self.guarded(cancel, work).await
    }

    pub fn trigger(&self) -> &SummarizationTrigger {
        &self.trigger
    }

    /// Run `work` until it finishes, `cancel` fires or the deadline passes.
    async fn guarded<T, F>(&self, cancel: &CancellationToken, work: F) -> Result<T, MemoryError>
    where
        F: Future<Output = Result<T, MemoryError>>,
    {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(MemoryError::Cancelled),
            result = tokio::time::timeout(self.timeout, work) => match result {
                Ok(result) => result,
                Err(_) => Err(MemoryError::Timeout {
                    after_ms: self.timeout.as_millis() as u64,
                }),
            },
        }
    }
}
