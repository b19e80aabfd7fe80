//! Automatic pin detection.
//!
//! A [`PinDetector`] inspects each stored message and proposes pins for
//! content worth recalling verbatim. Detected pins reference their source
//! message and are persisted alongside it by the engine.

use recollect_core::importance::Importance;
use recollect_core::message::{Message, Role};
use recollect_core::pin::PinType;

/// A pin proposed by a detector, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedPin {
    pub content: String,
    pub pin_type: PinType,
    pub importance: Importance,
}

pub trait PinDetector: Send + Sync {
    fn detect(&self, message: &Message) -> Vec<DetectedPin>;
}

/// Phrases that mark a user statement as something to keep.
const REMEMBER_CUES: &[&str] = &[
    "remember that",
    "remember:",
    "please remember",
    "note that",
    "keep in mind",
];

/// Flags fenced code blocks as `code` pins and explicit "remember"
/// statements from the user as `auto` pins.
#[derive(Debug, Clone)]
pub struct HeuristicPinDetector {
    /// Longer candidates are ignored.
    pub max_pin_chars: usize,
}

impl Default for HeuristicPinDetector {
    fn default() -> Self {
        Self {
            max_pin_chars: 2000,
        }
    }
}

impl HeuristicPinDetector {
    /// Bodies of ``` fenced blocks, without the fences.
    fn code_blocks(text: &str) -> Vec<String> {
        let mut blocks = Vec::new();
        let mut current: Option<Vec<&str>> = None;
        for line in text.lines() {
            if line.trim_start().starts_with("```") {
                match current.take() {
                    Some(lines) => blocks.push(lines.join("\n")),
                    None => current = Some(Vec::new()),
                }
            } else if let Some(lines) = current.as_mut() {
                lines.push(line);
            }
        }
        // An unterminated fence is not a block
        blocks.retain(|b| !b.trim().is_empty());
        blocks
    }

    fn remember_lines(text: &str) -> Vec<String> {
        text.lines()
            .map(str::trim)
            .filter(|line| {
                let lower = line.to_lowercase();
                REMEMBER_CUES.iter().any(|cue| lower.contains(cue))
            })
            .map(str::to_string)
            .collect()
    }
}

impl PinDetector for HeuristicPinDetector {
    fn detect(&self, message: &Message) -> Vec<DetectedPin> {
        let mut pins: Vec<DetectedPin> = Self::code_blocks(&message.text)
            .into_iter()
            .map(|content| DetectedPin {
                content,
                pin_type: PinType::Code,
                importance: Importance::PIN,
            })
            .collect();

        if message.role == Role::User {
            pins.extend(Self::remember_lines(&message.text).into_iter().map(|content| {
                DetectedPin {
                    content,
                    pin_type: PinType::Auto,
                    importance: Importance::PIN,
                }
            }));
        }

        pins.retain(|p| p.content.chars().count() <= self.max_pin_chars);
        pins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use recollect_core::session::SessionId;

    fn message(role: Role, text: &str) -> Message {
        Message {
            id: 1,
            session_id: SessionId::parse("s").unwrap(),
            role,
            text: text.into(),
            importance: Importance::MESSAGE,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn plain_text_yields_nothing() {
        let detector = HeuristicPinDetector::default();
        assert!(detector.detect(&message(Role::User, "How do lifetimes work?")).is_empty());
    }

    #[test]
    fn code_block_becomes_code_pin() {
        let detector = HeuristicPinDetector::default();
        let text = "Here you go:\n```rust\nfn main() {}\n```\nDone.";
        let pins = detector.detect(&message(Role::Assistant, text));
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].pin_type, PinType::Code);
        assert_eq!(pins[0].content, "fn main() {}");
    }

    #[test]
    fn unterminated_fence_ignored() {
        let detector = HeuristicPinDetector::default();
        let pins = detector.detect(&message(Role::Assistant, "```\nlet x = 1;"));
        assert!(pins.is_empty());
    }

    #[test]
    fn remember_cue_from_user_becomes_auto_pin() {
        let detector = HeuristicPinDetector::default();
        let pins = detector.detect(&message(
            Role::User,
            "Thanks.\nPlease remember that I deploy on ARM64.",
        ));
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].pin_type, PinType::Auto);
        assert_eq!(pins[0].content, "Please remember that I deploy on ARM64.");
    }

    #[test]
    fn remember_cue_from_assistant_ignored() {
        let detector = HeuristicPinDetector::default();
        let pins = detector.detect(&message(Role::Assistant, "Note that this is unsafe."));
        assert!(pins.is_empty());
    }

    #[test]
    fn oversized_candidates_dropped() {
        let detector = HeuristicPinDetector { max_pin_chars: 10 };
        let text = format!("```\n{}\n```", "x".repeat(50));
        assert!(detector.detect(&message(Role::User, &text)).is_empty());
    }
}
