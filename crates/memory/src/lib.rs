//! Store implementations for recollect.
//!
//! - [`InMemoryBackend`] keeps everything behind one lock; useful for tests
//!   and ephemeral sessions.
//! - [`SqliteBackend`] persists sessions, messages, summaries and pins in
//!   SQLite with cascading foreign keys.
//! - [`SplitContextSource`] serves context reads from three independent
//!   repositories when no shared backend is available.

pub mod in_memory;
pub mod split;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryBackend;
pub use split::SplitContextSource;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteBackend, SqliteOptions};
