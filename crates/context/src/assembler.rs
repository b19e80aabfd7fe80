//! Context assembly — the core of the memory engine.
//!
//! Merges three parts into one bounded context per request:
//!
//! 1. **Pins** — all of them, importance descending, never budget-limited
//! 2. **Summaries** — the top few by importance (oldest first on ties)
//! 3. **Recent messages** — chosen by a [`SelectionPolicy`] from the most
//!    recent window to fill whatever budget pins and summaries left
//!
//! # Determinism
//!
//! Assembly is a pure read: identical store contents always produce
//! identical output. Token costs come from
//! [`recollect_core::token::estimate_tokens`] only.

use crate::selection::{GreedyNewestFirst, SelectionPolicy};
use recollect_core::error::MemoryError;
use recollect_core::message::Message;
use recollect_core::pin::Pin;
use recollect_core::session::SessionId;
use recollect_core::store::{ContextInputs, ContextSource};
use recollect_core::summary::Summary;
use recollect_core::token::{estimate_all, estimate_tokens};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Default token budget for one assembled context.
pub const DEFAULT_TOKEN_LIMIT: i64 = 4000;
/// How many summaries are considered per context.
pub const DEFAULT_SUMMARY_LIMIT: usize = 5;
/// How many recent messages are considered per context.
pub const DEFAULT_MESSAGE_WINDOW: usize = 50;

// ── Types ─────────────────────────────────────────────────────────────────

/// The assembled context, ready to hand to the conversation orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub session_id: SessionId,
    /// Every pin of the session, importance descending.
    pub pins: Vec<Pin>,
    /// Top summaries, importance descending then oldest first.
    pub summaries: Vec<Summary>,
    /// Selected messages, oldest first.
    pub recent_messages: Vec<Message>,
    /// Estimated tokens of everything above.
    pub total_tokens: usize,
    pub metadata: AssemblyMetadata,
    /// Set when assembly failed and this empty context stands in for it.
    #[serde(default)]
    pub degraded: bool,
}

/// Budget bookkeeping for one assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Configured token budget.
    pub token_limit: i64,
    pub pin_tokens: usize,
    pub summary_tokens: usize,
    pub message_tokens: usize,
    /// Budget left for messages after pins and summaries; may be negative.
    pub message_budget: i64,
    /// Messages fetched from the recent window.
    pub messages_considered: usize,
    /// Messages that made it into the context.
    pub messages_included: usize,
    /// Name of the selection policy used.
    pub policy: String,
}

impl AssembledContext {
    /// A valid context with nothing in it.
    pub fn empty(session_id: SessionId, token_limit: i64) -> Self {
        Self {
            session_id,
            pins: Vec::new(),
            summaries: Vec::new(),
            recent_messages: Vec::new(),
            total_tokens: 0,
            metadata: AssemblyMetadata {
                token_limit,
                pin_tokens: 0,
                summary_tokens: 0,
                message_tokens: 0,
                message_budget: token_limit,
                messages_considered: 0,
                messages_included: 0,
                policy: String::new(),
            },
            degraded: false,
        }
    }

    /// An empty context standing in for a failed assembly.
    pub fn degraded(session_id: SessionId, token_limit: i64) -> Self {
        Self {
            degraded: true,
            ..Self::empty(session_id, token_limit)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty() && self.summaries.is_empty() && self.recent_messages.is_empty()
    }

    /// Render pins and summaries as a text block for a system message.
    /// Recent messages are left to the caller, who sends them as turns.
    pub fn system_preamble(&self) -> String {
        let mut sections = Vec::new();
        if !self.pins.is_empty() {
            let lines: Vec<String> = self
                .pins
                .iter()
                .map(|p| format!("- [{}] {}", p.pin_type, p.content))
                .collect();
            sections.push(format!("[Pinned Memory]\n{}", lines.join("\n")));
        }
        if !self.summaries.is_empty() {
            let lines: Vec<String> = self
                .summaries
                .iter()
                .map(|s| {
                    format!(
                        "- (messages {}-{}) {}",
                        s.start_message_id, s.end_message_id, s.text
                    )
                })
                .collect();
            sections.push(format!("[Conversation Summaries]\n{}", lines.join("\n")));
        }
        sections.join("\n\n")
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Holds no per-request state — create one and reuse it.
pub struct ContextAssembler {
    source: Arc<dyn ContextSource>,
    policy: Arc<dyn SelectionPolicy>,
    summary_limit: usize,
    message_window: usize,
}

impl ContextAssembler {
    /// An assembler with greedy selection, 5 summaries and a 50-message window.
    pub fn new(source: Arc<dyn ContextSource>) -> Self {
        Self {
            source,
            policy: Arc::new(GreedyNewestFirst),
            summary_limit: DEFAULT_SUMMARY_LIMIT,
            message_window: DEFAULT_MESSAGE_WINDOW,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn SelectionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_limits(mut self, summary_limit: usize, message_window: usize) -> Self {
        self.summary_limit = summary_limit;
        self.message_window = message_window;
        self
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Fetch pins, summaries and recent messages and assemble them under
    /// `token_limit`.
    ///
    /// Never fails on empty data; an empty session yields an empty context.
    /// A `token_limit` of zero or less selects no messages but still returns
    /// every pin and summary.
    pub async fn build_context(
        &self,
        session_id: &SessionId,
        token_limit: i64,
    ) -> Result<AssembledContext, MemoryError> {
        let inputs = self
            .source
            .load_context_inputs(session_id, self.summary_limit, self.message_window)
            .await?;
        Ok(self.assemble(session_id, inputs, token_limit))
    }

    /// Assemble already-fetched inputs.
    ///
    /// # Algorithm
    ///
    /// 1. Charge every pin and summary against the budget (never trimmed)
    /// 2. `remaining = token_limit - charged` (may be zero or negative)
    /// 3. Let the selection policy pick messages, newest first, within `remaining`
    /// 4. Reverse the picked messages into chronological order
    pub fn assemble(
        &self,
        session_id: &SessionId,
        inputs: ContextInputs,
        token_limit: i64,
    ) -> AssembledContext {
        let ContextInputs {
            pins,
            mut summaries,
            recent_messages,
        } = inputs;
        summaries.truncate(self.summary_limit);

        let pin_tokens = estimate_all(pins.iter().map(|p| p.content.as_str()));
        let summary_tokens = estimate_all(summaries.iter().map(|s| s.text.as_str()));
        let fixed_tokens = i64::try_from(pin_tokens + summary_tokens).unwrap_or(i64::MAX);
        let message_budget = token_limit.saturating_sub(fixed_tokens);

        let considered = recent_messages.len().min(self.message_window);
        let mut selected = self
            .policy
            .select(&recent_messages[..considered], message_budget);
        selected.reverse();

        let message_tokens: usize = selected.iter().map(|m| estimate_tokens(&m.text)).sum();
        let total_tokens = pin_tokens + summary_tokens + message_tokens;

        debug!(
            session = %session_id,
            pins = pins.len(),
            summaries = summaries.len(),
            messages = selected.len(),
            total_tokens,
            token_limit,
            "Assembled context"
        );

        AssembledContext {
            session_id: session_id.clone(),
            metadata: AssemblyMetadata {
                token_limit,
                pin_tokens,
                summary_tokens,
                message_tokens,
                message_budget,
                messages_considered: considered,
                messages_included: selected.len(),
                policy: self.policy.name().to_string(),
            },
            pins,
            summaries,
            recent_messages: selected,
            total_tokens,
            degraded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SkipOversized;
    use chrono::{Duration, Utc};
    use recollect_core::clock::ManualClock;
    use recollect_core::importance::Importance;
    use recollect_core::message::NewMessage;
    use recollect_core::pin::NewPin;
    use recollect_core::store::{MessageStore, PinStore, SessionStore, SummaryStore};
    use recollect_core::summary::NewSummary;
    use recollect_memory::InMemoryBackend;

    /// Text whose estimate is exactly `tokens`.
    fn text(tokens: usize) -> String {
        "a".repeat(tokens * 4)
    }

    async fn setup() -> (Arc<InMemoryBackend>, Arc<ManualClock>, SessionId) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let backend = Arc::new(InMemoryBackend::with_clock(clock.clone()));
        let sid = backend.create_session(None).await.unwrap().id;
        (backend, clock, sid)
    }

    async fn add_messages(
        backend: &InMemoryBackend,
        clock: &ManualClock,
        sid: &SessionId,
        tokens: &[usize],
    ) -> Vec<i64> {
        let mut ids = Vec::new();
        for t in tokens {
            clock.advance(Duration::seconds(1));
            let m = backend.create_message(NewMessage::user(sid.clone(), text(*t))).await.unwrap();
            ids.push(m.id);
        }
        ids
    }

    fn recount(ctx: &AssembledContext) -> usize {
        ctx.pins.iter().map(|p| estimate_tokens(&p.content)).sum::<usize>()
            + ctx.summaries.iter().map(|s| estimate_tokens(&s.text)).sum::<usize>()
            + ctx.recent_messages.iter().map(|m| estimate_tokens(&m.text)).sum::<usize>()
    }

    #[tokio::test]
    async fn scenario_pins_plus_greedy_messages() {
        let (backend, clock, sid) = setup().await;
        for t in [10, 20, 5] {
            backend.create_pin(NewPin::new(sid.clone(), text(t))).await.unwrap();
        }
        let ids = add_messages(&backend, &clock, &sid, &[50; 10]).await;

        let assembler = ContextAssembler::new(backend.clone());
        let ctx = assembler.build_context(&sid, 200).await.unwrap();

        assert_eq!(ctx.pins.len(), 3);
        assert_eq!(ctx.metadata.pin_tokens, 35);
        assert_eq!(ctx.metadata.message_budget, 165);
        assert_eq!(
            ctx.recent_messages.iter().map(|m| m.id).collect::<Vec<_>>(),
            ids[7..].to_vec()
        );
        assert_eq!(ctx.total_tokens, 35 + 150);
        assert_eq!(ctx.total_tokens, recount(&ctx));
    }

    #[tokio::test]
    async fn empty_session_is_valid_and_empty() {
        let (backend, _clock, sid) = setup().await;
        let ctx = ContextAssembler::new(backend).build_context(&sid, 4000).await.unwrap();
        assert!(ctx.is_empty());
        assert_eq!(ctx.total_tokens, 0);
        assert!(!ctx.degraded);
    }

    #[tokio::test]
    async fn unknown_session_is_empty_not_an_error() {
        let (backend, _clock, _sid) = setup().await;
        let ctx = ContextAssembler::new(backend)
            .build_context(&SessionId::new(), 4000)
            .await
            .unwrap();
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn zero_limit_keeps_pins_drops_messages() {
        let (backend, clock, sid) = setup().await;
        backend.create_pin(NewPin::new(sid.clone(), text(3))).await.unwrap();
        backend.create_pin(NewPin::new(sid.clone(), text(4))).await.unwrap();
        add_messages(&backend, &clock, &sid, &[1, 1]).await;

        let ctx = ContextAssembler::new(backend).build_context(&sid, 0).await.unwrap();
        assert_eq!(ctx.pins.len(), 2);
        assert!(ctx.recent_messages.is_empty());
        assert_eq!(ctx.total_tokens, 7);
        assert_eq!(ctx.metadata.message_budget, -7);
    }

    #[tokio::test]
    async fn most_negative_limit_saturates() {
        let (backend, clock, sid) = setup().await;
        backend.create_pin(NewPin::new(sid.clone(), text(3))).await.unwrap();
        add_messages(&backend, &clock, &sid, &[1, 2]).await;

        let ctx = ContextAssembler::new(backend.clone())
            .build_context(&sid, i64::MIN)
            .await
            .unwrap();
        assert_eq!(ctx.pins.len(), 1);
        assert!(ctx.recent_messages.is_empty());
        assert_eq!(ctx.metadata.message_budget, i64::MIN);
        assert_eq!(ctx.total_tokens, 3);

        let ctx = ContextAssembler::new(backend)
            .with_policy(Arc::new(SkipOversized))
            .build_context(&sid, i64::MAX)
            .await
            .unwrap();
        assert_eq!(ctx.recent_messages.len(), 2);
    }

    #[tokio::test]
    async fn pins_are_never_truncated_even_over_budget() {
        let (backend, clock, sid) = setup().await;
        backend.create_pin(NewPin::new(sid.clone(), text(500))).await.unwrap();
        add_messages(&backend, &clock, &sid, &[1]).await;

        let ctx = ContextAssembler::new(backend).build_context(&sid, 100).await.unwrap();
        assert_eq!(ctx.pins.len(), 1);
        assert!(ctx.recent_messages.is_empty());
        assert!(ctx.total_tokens > 100);
    }

    #[tokio::test]
    async fn memory_filling_budget_exactly_leaves_no_messages() {
        let (backend, clock, sid) = setup().await;
        backend.create_pin(NewPin::new(sid.clone(), text(60))).await.unwrap();
        backend
            .create_summary(NewSummary::for_range(sid.clone(), text(40), 1, 1))
            .await
            .unwrap();
        add_messages(&backend, &clock, &sid, &[1]).await;

        let ctx = ContextAssembler::new(backend).build_context(&sid, 100).await.unwrap();
        assert!(ctx.recent_messages.is_empty());
        assert_eq!(ctx.metadata.message_budget, 0);
    }

    #[tokio::test]
    async fn at_most_five_summaries_ranked() {
        let (backend, clock, sid) = setup().await;
        let mut ids = Vec::new();
        for score in [0.3, 0.9, 0.7, 0.7, 0.1, 0.8, 0.7] {
            clock.advance(Duration::seconds(1));
            let s = backend
                .create_summary(
                    NewSummary::for_range(sid.clone(), "s", 1, 2)
                        .with_importance(Importance::new(score).unwrap()),
                )
                .await
                .unwrap();
            ids.push(s.id);
        }

        let ctx = ContextAssembler::new(backend).build_context(&sid, 4000).await.unwrap();
        let got: Vec<i64> = ctx.summaries.iter().map(|s| s.id).collect();
        // 0.9, 0.8, then the three 0.7s in creation order
        assert_eq!(got, vec![ids[1], ids[5], ids[2], ids[3], ids[6]]);
    }

    #[tokio::test]
    async fn large_recent_message_blocks_older_ones() {
        let (backend, clock, sid) = setup().await;
        let ids = add_messages(&backend, &clock, &sid, &[5, 5, 90, 5]).await;

        let greedy = ContextAssembler::new(backend.clone());
        let ctx = greedy.build_context(&sid, 50).await.unwrap();
        assert_eq!(ctx.recent_messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[3]]);

        let skipping = ContextAssembler::new(backend).with_policy(Arc::new(SkipOversized));
        let ctx = skipping.build_context(&sid, 50).await.unwrap();
        assert_eq!(
            ctx.recent_messages.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![ids[0], ids[1], ids[3]]
        );
        assert_eq!(ctx.metadata.policy, "skip_oversized");
    }

    #[tokio::test]
    async fn window_caps_candidates() {
        let (backend, clock, sid) = setup().await;
        add_messages(&backend, &clock, &sid, &[1; 60]).await;

        let ctx = ContextAssembler::new(backend.clone()).build_context(&sid, 4000).await.unwrap();
        assert_eq!(ctx.recent_messages.len(), 50);
        assert_eq!(ctx.metadata.messages_considered, 50);

        let narrow = ContextAssembler::new(backend).with_limits(5, 10);
        let ctx = narrow.build_context(&sid, 4000).await.unwrap();
        assert_eq!(ctx.recent_messages.len(), 10);
    }

    #[tokio::test]
    async fn messages_returned_oldest_first() {
        let (backend, clock, sid) = setup().await;
        let ids = add_messages(&backend, &clock, &sid, &[2, 2, 2]).await;
        let ctx = ContextAssembler::new(backend).build_context(&sid, 4000).await.unwrap();
        assert_eq!(ctx.recent_messages.iter().map(|m| m.id).collect::<Vec<_>>(), ids);
    }

    #[tokio::test]
    async fn deterministic_assembly() {
        let (backend, clock, sid) = setup().await;
        backend.create_pin(NewPin::new(sid.clone(), "pinned")).await.unwrap();
        backend
            .create_summary(NewSummary::for_range(sid.clone(), "earlier", 1, 3))
            .await
            .unwrap();
        add_messages(&backend, &clock, &sid, &[3, 7, 11]).await;

        let assembler = ContextAssembler::new(backend);
        let first = assembler.build_context(&sid, 20).await.unwrap();
        let second = assembler.build_context(&sid, 20).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn preamble_renders_pins_and_summaries() {
        let sid = SessionId::parse("s").unwrap();
        let mut ctx = AssembledContext::empty(sid.clone(), 100);
        assert_eq!(ctx.system_preamble(), "");

        ctx.pins.push(Pin {
            id: 1,
            session_id: sid.clone(),
            content: "User is on Rust 1.88".into(),
            source_message_id: None,
            importance: Importance::PIN,
            pin_type: recollect_core::pin::PinType::User,
            created_at: Utc::now(),
        });
        ctx.summaries.push(Summary {
            id: 2,
            session_id: sid,
            text: "Discussed workspace layout".into(),
            message_count: 4,
            start_message_id: 1,
            end_message_id: 4,
            importance: Importance::SUMMARY,
            created_at: Utc::now(),
        });

        let preamble = ctx.system_preamble();
        assert!(preamble.contains("[Pinned Memory]\n- [user] User is on Rust 1.88"));
        assert!(preamble.contains("(messages 1-4) Discussed workspace layout"));
    }

    #[test]
    fn degraded_context_is_flagged() {
        let ctx = AssembledContext::degraded(SessionId::parse("s").unwrap(), 4000);
        assert!(ctx.degraded);
        assert!(ctx.is_empty());
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["total_tokens"], 0);
    }
}
