//! Execution context shared by all stages in a job, and the state they hand
//! to each other.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lf_av::{timemark_percent, DurationProbe, RunControl, Transcoder};
use lf_core::config::RenderConfig;
use lf_core::{Error, MediaFile, ProcessingOptions, Result, Stage};
use parking_lot::Mutex;

use crate::progress::Reporter;

/// Context passed to every stage during execution.
pub struct StageContext {
    /// The validated request.
    pub options: Arc<ProcessingOptions>,
    pub render: Arc<RenderConfig>,
    /// The job's temp workspace directory.
    pub workspace_dir: PathBuf,
    pub engine: Arc<dyn Transcoder>,
    pub probe: Arc<dyn DurationProbe>,
    /// Job cancellation token and engine process registry.
    pub control: RunControl,
    pub reporter: Arc<Reporter>,
}

impl StageContext {
    /// Progress callback for an engine run.
    ///
    /// Converts elapsed output seconds into local progress against `total`,
    /// publishes it for `stage` and logs an INFO line each time a multiple of
    /// `milestone_step` percent is crossed. Without a `total` nothing is
    /// reported and the stage stays at the start of its window. Reports stop
    /// as soon as the job is cancelled.
    pub fn engine_progress<'a>(
        &'a self,
        stage: Stage,
        label: &'a str,
        milestone_step: u32,
        total: Option<f64>,
    ) -> impl Fn(f64) + Send + Sync + 'a {
        let last_milestone = Mutex::new(0u32);
        let step = milestone_step.max(1);
        move |elapsed: f64| {
            if self.control.cancel.is_cancelled() {
                return;
            }
            let Some(total) = total else { return };
            let local = timemark_percent(elapsed, total);
            self.reporter.progress(stage, local, label);

            let reached = (local as u32 / step) * step;
            let mut last = last_milestone.lock();
            if reached > *last {
                *last = reached;
                self.reporter.info(format!("{label}: {reached}%"));
            }
        }
    }

    /// Probe `path`, failing with [`Error::Aborted`] instead if the job has
    /// already been cancelled.
    pub async fn probe_duration(&self, path: &Path) -> Result<f64> {
        self.control.check()?;
        self.probe.duration(path).await
    }
}

/// Intermediate results carried from one stage to the next.
#[derive(Debug, Default, Clone)]
pub struct JobState {
    pub video_duration: Option<f64>,
    pub selected_audio: Vec<MediaFile>,
    /// Sum of the probed input track durations, when all probes succeeded.
    pub input_audio_duration: Option<f64>,
    pub merged_audio: Option<PathBuf>,
    pub audio_duration: Option<f64>,
    /// `ceil(audio / video)` from the original clip duration.
    pub loop_count: Option<u32>,
    pub muted_video: Option<PathBuf>,
    pub looped_video: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
}

fn missing(what: &str) -> Error {
    Error::Internal(format!("{what} not available; stages ran out of order"))
}

impl JobState {
    pub fn video_duration(&self) -> Result<f64> {
        self.video_duration.ok_or_else(|| missing("video duration"))
    }

    pub fn audio_duration(&self) -> Result<f64> {
        self.audio_duration.ok_or_else(|| missing("merged audio duration"))
    }

    pub fn merged_audio(&self) -> Result<&Path> {
        self.merged_audio.as_deref().ok_or_else(|| missing("merged audio"))
    }

    pub fn muted_video(&self) -> Result<&Path> {
        self.muted_video.as_deref().ok_or_else(|| missing("muted video"))
    }

    pub fn looped_video(&self) -> Result<&Path> {
        self.looped_video.as_deref().ok_or_else(|| missing("looped video"))
    }
}
