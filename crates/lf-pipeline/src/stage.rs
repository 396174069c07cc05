//! The [`PipelineStage`] trait defines a single step of a job.
//!
//! Each stage reads what earlier stages left in the [`JobState`], does its
//! work (usually one or more engine runs) and records its own results for
//! the stages after it.

use async_trait::async_trait;
use lf_core::{Result, Stage};

use crate::context::{JobState, StageContext};

/// A single step in the job pipeline.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Which pipeline position this stage occupies.
    fn stage(&self) -> Stage;

    /// A short, human-readable name for logs.
    fn name(&self) -> &'static str {
        self.stage().as_str()
    }

    /// Perform the stage.
    ///
    /// Implementations must surface a cancelled job as
    /// [`lf_core::Error::Aborted`] and must not start new engine runs once
    /// the job token has fired.
    async fn execute(&self, ctx: &StageContext, state: &mut JobState) -> Result<()>;
}
