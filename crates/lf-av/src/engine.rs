//! Transcoding engine contract and the ffmpeg implementation.
//!
//! Stages describe one engine run as an [`EngineInvocation`] (inputs with
//! per-input options, an optional filter graph, explicit stream mappings and
//! output options) and hand it to a [`Transcoder`]. The transcoder reports
//! elapsed output time through a callback and resolves once the run has
//! terminated.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use lf_core::Result;

use crate::command::ToolCommand;
use crate::process::RunControl;

/// One input file and the options placed before its `-i`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInput {
    pub options: Vec<String>,
    pub path: PathBuf,
}

/// A single engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInvocation {
    /// Short name used for logging and the process registry.
    pub label: String,
    pub inputs: Vec<EngineInput>,
    pub filter_complex: Option<String>,
    pub maps: Vec<String>,
    pub output_options: Vec<String>,
    pub output: PathBuf,
    pub timeout: Option<Duration>,
}

impl EngineInvocation {
    pub fn new(label: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            inputs: Vec::new(),
            filter_complex: None,
            maps: Vec::new(),
            output_options: Vec::new(),
            output: output.into(),
            timeout: None,
        }
    }

    pub fn input(self, path: impl Into<PathBuf>) -> Self {
        self.input_with(Vec::<String>::new(), path)
    }

    /// Add an input preceded by `options` (e.g. `-f concat -safe 0`).
    pub fn input_with(
        mut self,
        options: impl IntoIterator<Item = impl Into<String>>,
        path: impl Into<PathBuf>,
    ) -> Self {
        self.inputs.push(EngineInput {
            options: options.into_iter().map(Into::into).collect(),
            path: path.into(),
        });
        self
    }

    pub fn filter_complex(mut self, graph: impl Into<String>) -> Self {
        self.filter_complex = Some(graph.into());
        self
    }

    pub fn map(mut self, spec: impl Into<String>) -> Self {
        self.maps.push(spec.into());
        self
    }

    pub fn output_options(mut self, opts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.output_options.extend(opts.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// Render the ffmpeg argument list.
    ///
    /// Progress goes to stderr as `key=value` lines (`-progress pipe:2`) and
    /// the regular log is limited to errors so that the stderr tail makes a
    /// useful diagnostic.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "-y",
            "-hide_banner",
            "-nostats",
            "-loglevel",
            "error",
            "-progress",
            "pipe:2",
        ]
        .map(String::from)
        .to_vec();

        for input in &self.inputs {
            args.extend(input.options.iter().cloned());
            args.push("-i".into());
            args.push(path_arg(&input.path));
        }
        if let Some(graph) = &self.filter_complex {
            args.push("-filter_complex".into());
            args.push(graph.clone());
        }
        for spec in &self.maps {
            args.push("-map".into());
            args.push(spec.clone());
        }
        args.extend(self.output_options.iter().cloned());
        args.push(path_arg(&self.output));
        args
    }
}

fn path_arg(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

/// Runs engine invocations.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Execute `invocation` to completion.
    ///
    /// `on_progress` receives the elapsed output time in seconds each time
    /// the engine reports it. Implementations must register the run in
    /// `control.processes` for its whole lifetime and fail with
    /// [`lf_core::Error::Aborted`] when its kill token fires.
    async fn run(
        &self,
        invocation: &EngineInvocation,
        control: &RunControl,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<()>;
}

/// [`Transcoder`] that drives the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
}

impl FfmpegEngine {
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self { ffmpeg_path }
    }
}

#[async_trait]
impl Transcoder for FfmpegEngine {
    async fn run(
        &self,
        invocation: &EngineInvocation,
        control: &RunControl,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<()> {
        let handle = control
            .processes
            .register(invocation.label.as_str(), &control.cancel)?;

        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.args(invocation.to_args());
        cmd.timeout_opt(invocation.timeout);
        tracing::debug!(label = %invocation.label, args = ?cmd.get_args(), "starting ffmpeg");

        cmd.execute_streaming(
            |line| {
                if let Some(secs) = parse_progress_line(line) {
                    on_progress(secs);
                }
            },
            handle.token(),
        )
        .await?;

        tracing::debug!(label = %invocation.label, "ffmpeg finished");
        Ok(())
    }
}

/// Parse an `out_time=HH:MM:SS.micros` progress line into seconds.
pub fn parse_progress_line(line: &str) -> Option<f64> {
    line.trim()
        .strip_prefix("out_time=")
        .and_then(parse_timemark)
}

/// Parse a `HH:MM:SS.fraction` timemark into seconds.
///
/// Returns `None` for malformed or negative marks (ffmpeg emits a large
/// negative value before the first frame is written).
pub fn parse_timemark(mark: &str) -> Option<f64> {
    let mut parts = mark.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

/// Local stage progress for `elapsed` out of `total` seconds, as a whole
/// percent capped at 99 (100 is reserved for the engine's terminal success).
pub fn timemark_percent(elapsed: f64, total: f64) -> f64 {
    if total <= 0.0 || !total.is_finite() || !elapsed.is_finite() {
        return 0.0;
    }
    (elapsed / total * 100.0).round().clamp(0.0, 99.0)
}
