//! # Recollect Core
//!
//! Domain types, store traits, and error definitions for the recollect
//! conversation memory engine. This crate performs **no I/O** — it defines
//! the domain model that the storage and assembly crates implement against.
//!
//! ## Design Philosophy
//!
//! Every store is defined as a trait here. Implementations live in
//! `recollect-memory`. This enables:
//! - Injecting repositories into the assembler instead of sharing globals
//! - Easy testing with in-memory implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod clock;
pub mod error;
pub mod importance;
pub mod message;
pub mod pin;
pub mod session;
pub mod store;
pub mod summary;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::MemoryError;
pub use importance::Importance;
pub use message::{Message, NewMessage, Role};
pub use pin::{NewPin, Pin, PinType};
pub use session::{Session, SessionId};
pub use store::{
    ContextInputs, ContextSource, MessageStore, PinStore, SessionStore, SummaryStore,
};
pub use summary::{NewSummary, Summary};
pub use token::estimate_tokens;
