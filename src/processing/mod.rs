//! # Processing State and Context
//!
//! Cross-cutting per-file tracking for the message pipeline.
//!
//! - [`ProcessingState`]: concurrency-safe registry of files currently under
//!   processing. Consulted by the file-watcher's intake filter to skip files
//!   already mid-flight and by graceful shutdown to await drain.
//! - [`ProcessingContext`]: per-file correlation identity with a monotonic
//!   error flag that decides archive-vs-fail routing at the end of a file's
//!   journey.

pub mod context;
pub mod state;

pub use context::{message_span, ProcessingContext};
pub use state::ProcessingState;
