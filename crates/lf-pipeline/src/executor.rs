//! Pipeline executor: runs the stages of a job in order with cancellation
//! checks and failure reporting.

use lf_core::{Error, Result, Stage};

use crate::context::{JobState, StageContext};
use crate::stage::PipelineStage;
use crate::stages::standard_stages;

/// Runs a fixed, strictly forward sequence of stages.
pub struct PipelineExecutor {
    stages: Vec<Box<dyn PipelineStage>>,
}

impl PipelineExecutor {
    /// Create a new executor from a list of stages.
    pub fn new(stages: Vec<Box<dyn PipelineStage>>) -> Self {
        Self { stages }
    }

    /// Executor for the standard six-stage job.
    pub fn standard() -> Self {
        Self::new(standard_stages())
    }

    pub fn stage_order(&self) -> Vec<Stage> {
        self.stages.iter().map(|s| s.stage()).collect()
    }

    /// Execute every stage in order.
    ///
    /// The job token is checked before each stage. The first stage error
    /// halts the run; engine diagnostics attached to it are published as
    /// ERROR log entries before the error is returned.
    pub async fn execute(&self, ctx: &StageContext, state: &mut JobState) -> Result<()> {
        if self.stages.is_empty() {
            return Err(Error::Internal("no stages to execute".into()));
        }
        if !self.stage_order().windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::Internal(format!(
                "stages must move strictly forward: {:?}",
                self.stage_order()
            )));
        }

        for stage in &self.stages {
            if ctx.control.cancel.is_cancelled() {
                tracing::info!(job_id = %ctx.reporter.job_id(), "pipeline cancelled before {}", stage.name());
                return Err(Error::Aborted);
            }

            ctx.reporter.stage_changed(stage.stage());
            tracing::info!(job_id = %ctx.reporter.job_id(), stage = stage.name(), "starting stage");

            if let Err(e) = stage.execute(ctx, state).await {
                // A run killed by abort may surface as an engine failure.
                let e = if ctx.control.cancel.is_cancelled() {
                    Error::Aborted
                } else {
                    e
                };
                report_stage_failure(ctx, stage.name(), &e);
                return Err(e);
            }
        }

        ctx.reporter.stage_changed(Stage::Done);
        Ok(())
    }
}

fn report_stage_failure(ctx: &StageContext, stage: &str, err: &Error) {
    if err.is_aborted() {
        tracing::info!(job_id = %ctx.reporter.job_id(), stage, "stage aborted");
        return;
    }
    ctx.reporter.error(format!("{stage} failed: {err}"));
    if let Error::Engine { diagnostics, .. } = err {
        if !diagnostics.trim().is_empty() {
            ctx.reporter
                .error(format!("Engine output:\n{}", diagnostics.trim()));
        }
    }
}
