//! Context assembly and summarization for recollect.
//!
//! Given a growing transcript, produce a bounded context that fits a token
//! budget while keeping the most important memory.
//!
//! # Context parts (in priority order)
//!
//! | Part | Source | Trim Strategy |
//! |------|--------|---------------|
//! | 1. Pins | Pin store | Never trimmed |
//! | 2. Summaries | Summary store | Top 5 by importance, never trimmed |
//! | 3. Recent messages | Message store | Fills what remains, newest first |

pub mod assembler;
pub mod detector;
pub mod engine;
pub mod selection;
pub mod summarizer;

pub use assembler::{AssembledContext, AssemblyMetadata, ContextAssembler};
pub use detector::{DetectedPin, HeuristicPinDetector, PinDetector};
pub use engine::{DEFAULT_TIMEOUT, MemoryEngine, RecordedTurn};
pub use selection::{GreedyNewestFirst, SelectionPolicy, SkipOversized, policy_from_name};
pub use summarizer::{PendingRange, SummarizationPolicy, SummarizationTrigger, SummaryGenerator};
