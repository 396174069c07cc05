//! lf-core: shared types, IDs, errors, configuration, and the job event bus.
//!
//! This crate is the foundational dependency for the other lf-* crates. It
//! holds the processing request model, the unified error taxonomy, the
//! render configuration, and the broadcast bus that carries log and progress
//! events up to the caller.

pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use format::format_duration;
pub use ids::JobId;
pub use media::*;
