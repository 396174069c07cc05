//! Job controller: the single entry point for running and aborting jobs.
//!
//! A controller runs at most one job at a time. Submitting while a job is
//! active fails with [`Error::Conflict`]; the slot is only released after the
//! running job has finished its cleanup, so an abort followed by a new
//! submission never overlaps two jobs' engine processes or workspaces.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lf_av::{DurationProbe, FfmpegEngine, FfprobeProber, RunControl, ToolRegistry, Transcoder, Workspace};
use lf_core::config::{Config, RenderConfig};
use lf_core::events::{EventBus, JobEvent, LogLevel};
use lf_core::{
    format_duration, Error, JobId, JobStats, ProcessingOptions, ProcessingResult, Result, Stage,
};
use parking_lot::Mutex;

use crate::context::{JobState, StageContext};
use crate::executor::PipelineExecutor;
use crate::progress::Reporter;

/// The job currently occupying the controller.
#[derive(Debug, Clone)]
pub struct ActiveJob {
    pub id: JobId,
    pub started_at: DateTime<Utc>,
    pub control: RunControl,
    current_stage: Arc<Mutex<Stage>>,
}

impl ActiveJob {
    /// Stage the job is in. Ends at `Done`, `Aborted` or `Failed`.
    pub fn current_stage(&self) -> Stage {
        *self.current_stage.lock()
    }
}

/// Runs jobs one at a time against a transcoding engine and a prober.
pub struct JobController {
    render: Arc<RenderConfig>,
    engine: Arc<dyn Transcoder>,
    probe: Arc<dyn DurationProbe>,
    bus: Arc<EventBus>,
    executor: PipelineExecutor,
    active: Mutex<Option<ActiveJob>>,
}

/// Releases the active slot when the job's run is over.
struct SlotGuard<'a> {
    slot: &'a Mutex<Option<ActiveJob>>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

impl JobController {
    pub fn new(
        render: RenderConfig,
        engine: Arc<dyn Transcoder>,
        probe: Arc<dyn DurationProbe>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            render: Arc::new(render),
            engine,
            probe,
            bus,
            executor: PipelineExecutor::standard(),
            active: Mutex::new(None),
        }
    }

    /// Controller backed by the ffmpeg and ffprobe binaries in `tools`.
    pub fn from_tools(config: &Config, tools: &ToolRegistry, bus: Arc<EventBus>) -> Result<Self> {
        let ffmpeg = tools.require("ffmpeg")?.to_path_buf();
        let ffprobe = tools.require("ffprobe")?.to_path_buf();
        Ok(Self::new(
            config.render.clone(),
            Arc::new(FfmpegEngine::new(ffmpeg)),
            Arc::new(FfprobeProber::new(ffprobe)),
            bus,
        ))
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn active_job(&self) -> Option<ActiveJob> {
        self.active.lock().clone()
    }

    /// Labels of the engine processes the active job is running.
    pub fn active_processes(&self) -> Vec<String> {
        self.active
            .lock()
            .as_ref()
            .map(|job| job.control.processes.active_labels())
            .unwrap_or_default()
    }

    /// Cancel the active job. Returns `false` if nothing was running.
    ///
    /// The job token fires and every registered engine process is signalled.
    /// The job itself resolves with [`Error::Aborted`] once its stage has
    /// unwound and the workspace is gone.
    pub fn abort(&self) -> bool {
        let Some(job) = self.active_job() else {
            tracing::debug!("abort requested with no active job");
            return false;
        };
        let killed = job.control.abort();
        tracing::info!(job_id = %job.id, killed, "abort requested");
        self.bus.log(
            job.id,
            LogLevel::Warning,
            "Abort requested; stopping engine processes",
        );
        true
    }

    fn claim(&self) -> Result<(ActiveJob, SlotGuard<'_>)> {
        let mut slot = self.active.lock();
        if let Some(running) = slot.as_ref() {
            return Err(Error::Conflict(format!(
                "job {} is still running",
                running.id
            )));
        }
        let job = ActiveJob {
            id: JobId::new(),
            started_at: Utc::now(),
            control: RunControl::new(),
            current_stage: Arc::new(Mutex::new(Stage::Probe)),
        };
        *slot = Some(job.clone());
        Ok((job, SlotGuard { slot: &self.active }))
    }

    /// Run one job to completion.
    ///
    /// Resolves with the output path and statistics on success. Every exit
    /// path removes the job's workspace before the controller accepts the
    /// next submission.
    pub async fn submit(&self, options: ProcessingOptions) -> Result<ProcessingResult> {
        let (job, _slot) = self.claim()?;
        let reporter = Arc::new(Reporter::with_stage(
            self.bus.clone(),
            job.id,
            job.current_stage.clone(),
        ));
        reporter.publish(JobEvent::Started);
        tracing::info!(job_id = %job.id, video = %options.selected_video.path.display(), "job started");

        let result = self.run(&job, options, &reporter).await;

        match &result {
            Ok(done) => {
                reporter.publish(JobEvent::Completed {
                    output_path: done.output_path.clone(),
                    stats: done.stats,
                });
                tracing::info!(job_id = %job.id, output = %done.output_path.display(), "job completed");
            }
            Err(e) if e.is_aborted() => {
                reporter.stage_changed(Stage::Aborted);
                reporter.warning("Processing aborted by user");
                reporter.publish(JobEvent::Aborted);
            }
            Err(e) => {
                reporter.stage_changed(Stage::Failed);
                reporter.error(format!("Processing failed: {e}"));
                reporter.info(format!("Troubleshooting: {}", e.troubleshooting()));
                reporter.publish(JobEvent::Failed {
                    kind: e.kind().to_string(),
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn run(
        &self,
        job: &ActiveJob,
        options: ProcessingOptions,
        reporter: &Arc<Reporter>,
    ) -> Result<ProcessingResult> {
        reporter.info(format!(
            "Source video: {} | {} of {} audio files{} | transition: {}",
            options.selected_video.name,
            options.audio_count,
            options.audio_files.len(),
            if options.randomize_audio { " (random)" } else { "" },
            options.transition_mode
        ));
        options.validate()?;

        let workspace = Workspace::create(&options.output_folder, job.started_at)?;
        let ctx = StageContext {
            options: Arc::new(options),
            render: self.render.clone(),
            workspace_dir: workspace.path().to_path_buf(),
            engine: self.engine.clone(),
            probe: self.probe.clone(),
            control: job.control.clone(),
            reporter: reporter.clone(),
        };

        let mut state = JobState::default();
        let outcome = self.executor.execute(&ctx, &mut state).await;

        // Every engine run has returned by now; remove intermediates before
        // reporting the outcome.
        if let Err(e) = workspace.close() {
            reporter.warning(format!("Could not remove temporary files: {e}"));
        }
        outcome?;

        let output_path = state
            .output_path
            .clone()
            .ok_or_else(|| Error::Internal("pipeline finished without an output".into()))?;
        let stats = JobStats::new(
            state.selected_audio.len(),
            state.audio_duration()?,
            state.video_duration()?,
            state.loop_count.unwrap_or(1),
        );
        reporter.success(format!(
            "Finished in {}: {} audio files, {} of audio, looped {}x",
            format_duration((Utc::now() - job.started_at).num_milliseconds() as f64 / 1000.0),
            stats.audio_count,
            format_duration(stats.total_audio_duration),
            stats.loop_count
        ));
        Ok(ProcessingResult::new(output_path, stats))
    }
}
