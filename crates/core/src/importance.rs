//! Importance scores — the `[0, 1]` retrieval priority carried by every
//! memory row.
//!
//! Scores are assigned by callers; the engine only stores and sorts them.
//! Defaults rank deliberately flagged memory above machine-compressed
//! memory, which in turn ranks above raw transcript turns.

use crate::error::MemoryError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A validated importance score in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Importance(f64);

impl Importance {
    /// Default for transcript messages.
    pub const MESSAGE: Importance = Importance(0.5);
    /// Default for summaries.
    pub const SUMMARY: Importance = Importance(0.7);
    /// Default for pins.
    pub const PIN: Importance = Importance(0.8);

    /// Validate and wrap a raw score.
    pub fn new(score: f64) -> Result<Self, MemoryError> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(MemoryError::Validation(format!(
                "importance_score must be within [0, 1], got {score}"
            )));
        }
        Ok(Self(score))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Total order used by every "importance descending" sort.
    pub fn cmp_desc(&self, other: &Self) -> Ordering {
        other.0.total_cmp(&self.0)
    }
}

impl TryFrom<f64> for Importance {
    type Error = MemoryError;

    fn try_from(score: f64) -> Result<Self, Self::Error> {
        Self::new(score)
    }
}

impl From<Importance> for f64 {
    fn from(score: Importance) -> Self {
        score.0
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
