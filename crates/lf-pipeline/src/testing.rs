//! In-memory engine and prober for pipeline tests.
//!
//! [`FakeMedia`] keeps a table of media durations. Probing a path looks it
//! up; running an invocation writes a placeholder output file and records
//! the duration that a real engine would have produced.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lf_av::{DurationProbe, EngineInvocation, RunControl, Transcoder};
use lf_core::config::RenderConfig;
use lf_core::events::EventBus;
use lf_core::{Error, JobId, MediaFile, ProcessingOptions, Result, TransitionMode};
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::context::StageContext;
use crate::progress::Reporter;

#[derive(Default)]
pub struct FakeMedia {
    durations: Mutex<HashMap<PathBuf, f64>>,
    hang_on: Mutex<Option<String>>,
    fail_on: Mutex<Option<String>>,
    timeout_on: Mutex<Option<String>>,
    invocations: Mutex<Vec<EngineInvocation>>,
}

impl FakeMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_duration(&self, path: impl Into<PathBuf>, secs: f64) {
        self.durations.lock().insert(path.into(), secs);
    }

    /// Block runs with this label until they are killed.
    pub fn hang_on(&self, label: &str) {
        *self.hang_on.lock() = Some(label.to_string());
    }

    pub fn release_hang(&self) {
        self.hang_on.lock().take();
    }

    /// Fail runs with this label with an engine error.
    pub fn fail_on(&self, label: &str) {
        *self.fail_on.lock() = Some(label.to_string());
    }

    /// Fail runs with this label as if the engine hit its time limit.
    pub fn timeout_on(&self, label: &str) {
        *self.timeout_on.lock() = Some(label.to_string());
    }

    pub fn invocations(&self) -> Vec<EngineInvocation> {
        self.invocations.lock().clone()
    }

    pub fn invocation(&self, label: &str) -> Option<EngineInvocation> {
        self.invocations().into_iter().find(|i| i.label == label)
    }

    fn duration_of(&self, path: &Path) -> Option<f64> {
        self.durations.lock().get(path).copied()
    }

    /// Duration a real engine would produce for `inv`.
    fn output_duration(&self, inv: &EngineInvocation) -> f64 {
        let inputs: Vec<f64> = inv
            .inputs
            .iter()
            .filter_map(|i| self.duration_of(&i.path))
            .collect();
        let cut = inv
            .output_options
            .iter()
            .position(|o| o == "-t")
            .and_then(|i| inv.output_options.get(i + 1))
            .and_then(|t| t.parse::<f64>().ok());

        match inv.label.as_str() {
            "merge-audio" => inputs.iter().sum(),
            "merge-final" => inputs.iter().copied().fold(f64::INFINITY, f64::min),
            _ => cut.or_else(|| inputs.first().copied()).unwrap_or(0.0),
        }
    }
}

#[async_trait]
impl Transcoder for FakeMedia {
    async fn run(
        &self,
        invocation: &EngineInvocation,
        control: &RunControl,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<()> {
        let handle = control
            .processes
            .register(invocation.label.as_str(), &control.cancel)?;
        self.invocations.lock().push(invocation.clone());

        let hang = self.hang_on.lock().as_deref() == Some(invocation.label.as_str());
        if hang {
            handle.token().cancelled().await;
            return Err(Error::Aborted);
        }
        let fail = self.fail_on.lock().as_deref() == Some(invocation.label.as_str());
        if fail {
            return Err(Error::engine(
                "ffmpeg",
                "exited with status 1",
                "Invalid data found when processing input",
            ));
        }

        let timeout = self.timeout_on.lock().as_deref() == Some(invocation.label.as_str());
        if timeout {
            on_progress(self.output_duration(invocation) / 2.0);
            return Err(Error::timeout(
                invocation.label.as_str(),
                Duration::from_secs(1800),
            ));
        }

        let duration = self.output_duration(invocation);
        on_progress(duration / 2.0);
        on_progress(duration);

        if let Some(parent) = invocation.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&invocation.output, b"fake media")?;
        self.set_duration(invocation.output.clone(), duration);
        Ok(())
    }
}

#[async_trait]
impl DurationProbe for FakeMedia {
    async fn duration(&self, path: &Path) -> Result<f64> {
        self.duration_of(path)
            .ok_or_else(|| Error::media_read(path, "no duration reported"))
    }
}

/// A source folder with one `secs_video`-second clip and `audio` tracks,
/// and an empty output folder.
pub struct Library {
    pub dir: TempDir,
    pub options: ProcessingOptions,
}

pub fn library(fake: &FakeMedia, video_secs: f64, audio: &[(&str, f64)]) -> Library {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source");
    let output = dir.path().join("output");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::create_dir_all(&output).unwrap();

    let video = source.join("clip.mp4");
    std::fs::write(&video, b"video").unwrap();
    fake.set_duration(&video, video_secs);

    let audio_files: Vec<MediaFile> = audio
        .iter()
        .map(|(name, secs)| {
            let path = source.join(name);
            std::fs::write(&path, b"audio").unwrap();
            fake.set_duration(&path, *secs);
            MediaFile::new(*name, path)
        })
        .collect();

    let options = ProcessingOptions {
        source_folder: source,
        output_folder: output,
        selected_video: MediaFile::new("clip.mp4", video),
        audio_count: audio_files.len(),
        audio_files,
        randomize_audio: false,
        transition_mode: TransitionMode::None,
    };
    Library { dir, options }
}

/// A ready-to-use stage context over a fake engine.
pub struct Harness {
    pub ctx: StageContext,
    pub bus: Arc<EventBus>,
    pub fake: Arc<FakeMedia>,
    pub library: Library,
}

pub fn harness(fake: Arc<FakeMedia>) -> Harness {
    let library = library(&fake, 10.0, &[("a.mp3", 5.0), ("b.mp3", 5.0)]);
    let bus = Arc::new(EventBus::default());
    let workspace_dir = library.dir.path().join("work");
    std::fs::create_dir_all(&workspace_dir).unwrap();

    let ctx = StageContext {
        options: Arc::new(library.options.clone()),
        render: Arc::new(RenderConfig::default()),
        workspace_dir,
        engine: fake.clone(),
        probe: fake.clone(),
        control: RunControl::new(),
        reporter: Arc::new(Reporter::new(bus.clone(), JobId::new())),
    };
    Harness {
        ctx,
        bus,
        fake,
        library,
    }
}
