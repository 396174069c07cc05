//! Global progress aggregation and job event reporting.
//!
//! Each pipeline stage owns a fixed window of the global 0-100 range. A
//! stage reports local progress (0-100) and [`global_percent`] maps it into
//! its window. [`Reporter`] publishes the result on the [`EventBus`], keeps
//! the emitted sequence non-decreasing and mirrors log entries into
//! `tracing`.

use std::sync::Arc;

use lf_core::events::{EventBus, JobEvent, LogLevel};
use lf_core::{JobId, Stage};
use parking_lot::Mutex;

/// Global `[start, end]` window of a stage.
pub fn window(stage: Stage) -> (f64, f64) {
    match stage {
        Stage::Probe => (0.0, 3.0),
        Stage::SelectAudio => (3.0, 5.0),
        Stage::MergeAudio => (5.0, 20.0),
        Stage::MuteVideo => (20.0, 25.0),
        Stage::LoopVideo => (26.0, 70.0),
        Stage::MergeFinal => (71.0, 100.0),
        Stage::Done => (100.0, 100.0),
        Stage::Aborted | Stage::Failed => (0.0, 0.0),
    }
}

/// Map `local` progress of `stage` into the global range. `local` is
/// clamped to `[0, 100]`.
pub fn global_percent(stage: Stage, local: f64) -> f64 {
    let (start, end) = window(stage);
    let local = if local.is_nan() { 0.0 } else { local.clamp(0.0, 100.0) };
    start + (end - start) * local / 100.0
}

/// Whole percentage emitted for `local` progress of `stage`.
///
/// Rounded to the nearest integer, except that 100 is only produced by the
/// final stage at local 100.
pub fn emitted_percent(stage: Stage, local: f64) -> u8 {
    let percent = global_percent(stage, local).round();
    let finished = matches!(stage, Stage::MergeFinal | Stage::Done) && local >= 100.0;
    if percent >= 100.0 && !finished {
        99
    } else {
        percent as u8
    }
}

/// Publishes a job's log and progress events.
pub struct Reporter {
    bus: Arc<EventBus>,
    job_id: JobId,
    stage: Arc<Mutex<Stage>>,
    high_water: Mutex<Option<u8>>,
}

impl Reporter {
    pub fn new(bus: Arc<EventBus>, job_id: JobId) -> Self {
        Self::with_stage(bus, job_id, Arc::new(Mutex::new(Stage::Probe)))
    }

    /// Reporter that records stage changes into a cell shared with the
    /// caller.
    pub fn with_stage(bus: Arc<EventBus>, job_id: JobId, stage: Arc<Mutex<Stage>>) -> Self {
        Self {
            bus,
            job_id,
            stage,
            high_water: Mutex::new(None),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn publish(&self, event: JobEvent) {
        self.bus.publish(self.job_id, event);
    }

    /// Emit a user-facing log entry and mirror it into `tracing`.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(job_id = %self.job_id, "{message}")
            }
            LogLevel::Warning => tracing::warn!(job_id = %self.job_id, "{message}"),
            LogLevel::Error => tracing::error!(job_id = %self.job_id, "{message}"),
        }
        self.bus.log(self.job_id, level, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Record and publish a stage transition. Once the job has reached a
    /// terminal stage further transitions are ignored.
    pub fn stage_changed(&self, stage: Stage) {
        {
            let mut current = self.stage.lock();
            if current.is_terminal() {
                tracing::debug!(job_id = %self.job_id, current = %*current, %stage, "ignoring stage change after terminal stage");
                return;
            }
            *current = stage;
        }
        tracing::debug!(job_id = %self.job_id, %stage, "stage changed");
        self.publish(JobEvent::StageChanged { stage });
    }

    pub fn current_stage(&self) -> Stage {
        *self.stage.lock()
    }

    /// Report `local` progress for `stage`.
    ///
    /// Emits a progress event only when the rounded global percentage moves
    /// past the highest value already emitted, so the stream never goes
    /// backwards.
    pub fn progress(&self, stage: Stage, local: f64, label: &str) {
        let percent = emitted_percent(stage, local);
        {
            let mut high = self.high_water.lock();
            if matches!(*high, Some(h) if percent <= h) {
                return;
            }
            *high = Some(percent);
        }
        tracing::trace!(job_id = %self.job_id, percent, label, "progress");
        self.publish(JobEvent::Progress {
            percent,
            label: label.to_string(),
        });
    }

    /// Highest percentage emitted so far.
    pub fn last_percent(&self) -> Option<u8> {
        *self.high_water.lock()
    }
}
