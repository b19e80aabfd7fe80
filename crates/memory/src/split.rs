//! Context reads composed from three independent repositories.
//!
//! The pin, summary and message reads are issued one after another with no
//! shared snapshot. Under concurrent writers a context may therefore mix
//! state from slightly different instants, e.g. a summary whose range ends
//! after the newest message returned. Use a backend's own
//! [`ContextSource`] impl when one exists; this adapter accepts that race.

use async_trait::async_trait;
use recollect_core::error::MemoryError;
use recollect_core::session::SessionId;
use recollect_core::store::{ContextInputs, ContextSource, MessageStore, PinStore, SummaryStore};
use std::sync::Arc;

pub struct SplitContextSource {
    pins: Arc<dyn PinStore>,
    summaries: Arc<dyn SummaryStore>,
    messages: Arc<dyn MessageStore>,
}

impl SplitContextSource {
    pub fn new(
        pins: Arc<dyn PinStore>,
        summaries: Arc<dyn SummaryStore>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            pins,
            summaries,
            messages,
        }
    }
}

#[async_trait]
impl ContextSource for SplitContextSource {
    async fn load_context_inputs(
        &self,
        session_id: &SessionId,
        summary_limit: usize,
        message_window: usize,
    ) -> Result<ContextInputs, MemoryError> {
        let pins = self.pins.list_pins(session_id, None).await?;
        let summaries = self.summaries.top_summaries(session_id, summary_limit).await?;
        let recent_messages = self.messages.recent_messages(session_id, message_window).await?;
        Ok(ContextInputs {
            pins,
            summaries,
            recent_messages,
        })
    }
}
