//! # lf-pipeline
//!
//! Job orchestration for loopforge.
//!
//! This crate provides:
//!
//! - **[`JobController`]** -- accepts one job at a time, owns its workspace
//!   and cancellation, and reports the outcome.
//! - **[`PipelineStage`]** trait and the six built-in [`stages`] (probe,
//!   select audio, merge audio, mute video, loop video, final merge).
//! - **[`PipelineExecutor`]** -- runs stages strictly in order, checking for
//!   cancellation between them.
//! - **[`Reporter`]** -- maps stage-local progress into the global 0-100
//!   range and publishes log and progress events.
//! - **[`select_audio`]** -- deterministic or random track selection.

pub mod context;
pub mod controller;
pub mod executor;
pub mod progress;
pub mod selector;
pub mod stage;
pub mod stages;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at the crate root.
pub use context::{JobState, StageContext};
pub use controller::{ActiveJob, JobController};
pub use executor::PipelineExecutor;
pub use progress::{emitted_percent, global_percent, window, Reporter};
pub use selector::{select_audio, select_audio_with_rng};
pub use stage::PipelineStage;
pub use stages::standard_stages;
