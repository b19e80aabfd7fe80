//! Summarization trigger.
//!
//! Decides when the uncompressed tail of a transcript should be condensed
//! and persists the resulting summary. Producing the summary text is the
//! job of a [`SummaryGenerator`] (normally an LLM provider adapter).
//!
//! Summarized messages are never deleted; a summary only records the id
//! range it stands in for.

use async_trait::async_trait;
use recollect_core::error::MemoryError;
use recollect_core::importance::Importance;
use recollect_core::message::Message;
use recollect_core::session::SessionId;
use recollect_core::store::{MessageStore, SummaryStore};
use recollect_core::summary::{NewSummary, Summary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Produces summary text for a run of messages.
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn summarize(
        &self,
        session_id: &SessionId,
        messages: &[Message],
    ) -> Result<String, MemoryError>;
}

/// When to summarize.
///
/// A session is due once more than `threshold` messages follow the last
/// summarized id. The newest `keep_recent` of them stay uncompressed so the
/// assembler still sees them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummarizationPolicy {
    pub threshold: usize,
    pub keep_recent: usize,
    pub importance: Importance,
}

impl Default for SummarizationPolicy {
    fn default() -> Self {
        Self {
            threshold: 20,
            keep_recent: 10,
            importance: Importance::SUMMARY,
        }
    }
}

/// A range of messages due for summarization.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRange {
    pub start_message_id: i64,
    pub end_message_id: i64,
    /// The messages in the range, oldest first.
    pub messages: Vec<Message>,
}

pub struct SummarizationTrigger {
    messages: Arc<dyn MessageStore>,
    summaries: Arc<dyn SummaryStore>,
    policy: SummarizationPolicy,
}

impl SummarizationTrigger {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        summaries: Arc<dyn SummaryStore>,
        policy: SummarizationPolicy,
    ) -> Self {
        Self {
            messages,
            summaries,
            policy,
        }
    }

    pub fn policy(&self) -> &SummarizationPolicy {
        &self.policy
    }

    /// The range that should be summarized now, if any.
    pub async fn pending(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<PendingRange>, MemoryError> {
        let summarized_up_to = self.summaries.latest_summarized_id(session_id).await?;
        let mut uncompressed = self.messages.messages_after(session_id, summarized_up_to).await?;

        if uncompressed.len() <= self.policy.threshold {
            debug!(
                "Session {session_id}: {} uncompressed messages, threshold {}",
                uncompressed.len(),
                self.policy.threshold
            );
            return Ok(None);
        }

        let keep = self.policy.keep_recent.min(uncompressed.len());
        uncompressed.truncate(uncompressed.len() - keep);

        let (start_message_id, end_message_id) = match (uncompressed.first(), uncompressed.last()) {
            (Some(first), Some(last)) => (first.id, last.id),
            _ => return Ok(None),
        };
        Ok(Some(PendingRange {
            start_message_id,
            end_message_id,
            messages: uncompressed,
        }))
    }

    /// Persist one summary over `[start_id, end_id]` with
    /// `message_count = end_id - start_id + 1`.
    ///
    /// Uses the policy's importance (0.7 by default) unless `importance`
    /// overrides it.
    pub async fn record_summary(
        &self,
        session_id: &SessionId,
        start_id: i64,
        end_id: i64,
        text: impl Into<String>,
        importance: Option<Importance>,
    ) -> Result<Summary, MemoryError> {
        let summary = NewSummary::for_range(session_id.clone(), text, start_id, end_id)
            .with_importance(importance.unwrap_or(self.policy.importance));
        self.summaries.create_summary(summary).await
    }

    /// Summarize the pending range with `generator` if the session is due.
    pub async fn run(
        &self,
        session_id: &SessionId,
        generator: &dyn SummaryGenerator,
    ) -> Result<Option<Summary>, MemoryError> {
        let Some(range) = self.pending(session_id).await? else {
            return Ok(None);
        };

        let text = generator.summarize(session_id, &range.messages).await?;
        let summary = self
            .record_summary(
                session_id,
                range.start_message_id,
                range.end_message_id,
                text,
                None,
            )
            .await?;

        info!(
            "Summarized messages {}..={} of session {session_id} into summary {}",
            range.start_message_id, range.end_message_id, summary.id
        );
        Ok(Some(summary))
    }
}
