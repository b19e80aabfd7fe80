//! Message selection policies.
//!
//! After pins and summaries are charged against the budget, a policy
//! decides which recent messages fill what is left. Policies receive the
//! candidates newest first and return the chosen subset, also newest first.

use recollect_core::message::Message;
use recollect_core::token::estimate_tokens;
use std::sync::Arc;

pub trait SelectionPolicy: Send + Sync {
    /// Short identifier used in configuration and logs.
    fn name(&self) -> &'static str;

    /// Choose messages from `newest_first` whose estimated tokens sum to at
    /// most `remaining`. A non-positive `remaining` selects nothing.
    fn select(&self, newest_first: &[Message], remaining: i64) -> Vec<Message>;
}

fn cost_of(message: &Message) -> i64 {
    i64::try_from(estimate_tokens(&message.text)).unwrap_or(i64::MAX)
}

/// Walk newest to oldest and stop at the first message that does not fit.
///
/// A single large recent message blocks every older one, even when smaller
/// older messages would fit in aggregate.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyNewestFirst;

impl SelectionPolicy for GreedyNewestFirst {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn select(&self, newest_first: &[Message], remaining: i64) -> Vec<Message> {
        if remaining <= 0 {
            return Vec::new();
        }
        let mut used: i64 = 0;
        let mut selected = Vec::new();
        for message in newest_first {
            let cost = cost_of(message);
            if used.saturating_add(cost) > remaining {
                break;
            }
            used = used.saturating_add(cost);
            selected.push(message.clone());
        }
        selected
    }
}

/// Walk newest to oldest, skipping messages that do not fit and continuing
/// with older ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipOversized;

impl SelectionPolicy for SkipOversized {
    fn name(&self) -> &'static str {
        "skip_oversized"
    }

    fn select(&self, newest_first: &[Message], remaining: i64) -> Vec<Message> {
        if remaining <= 0 {
            return Vec::new();
        }
        let mut used: i64 = 0;
        newest_first
            .iter()
            .filter(|message| {
                let cost = cost_of(message);
                if used.saturating_add(cost) > remaining {
                    return false;
                }
                used = used.saturating_add(cost);
                true
            })
            .cloned()
            .collect()
    }
}

/// Resolve a policy by its configured name.
pub fn policy_from_name(name: &str) -> Option<Arc<dyn SelectionPolicy>> {
    match name {
        "greedy" => Some(Arc::new(GreedyNewestFirst)),
        "skip_oversized" => Some(Arc::new(SkipOversized)),
        _ => None,
    }
}
