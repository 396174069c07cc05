//! # lf-av
//!
//! Engine plumbing for the loopforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find ffmpeg and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout,
//!   stderr streaming and cancellation.
//! - **Process tracking** ([`ProcessRegistry`], [`RunControl`]) -- the
//!   job-scoped cancellation token and registry of running engine processes.
//! - **Probing** ([`DurationProbe`], [`FfprobeProber`]) -- media durations.
//! - **Engine contract** ([`Transcoder`], [`FfmpegEngine`]) -- one engine run
//!   described as an [`EngineInvocation`] with timemark progress.
//! - **Workspace management** ([`Workspace`]) -- the per-job temp directory.
//! - **Folder scanning** ([`scan_folder`]) -- list candidate media files.
//! - **Actions** ([`actions`]) -- audio merge, mute, loop render, final mux.

pub mod actions;
pub mod command;
pub mod engine;
pub mod probe;
pub mod process;
pub mod scan;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use engine::{
    parse_timemark, timemark_percent, EngineInput, EngineInvocation, FfmpegEngine, Transcoder,
};
pub use probe::{DurationProbe, FfprobeProber};
pub use process::{ProcessHandle, ProcessRegistry, RunControl};
pub use scan::{scan_folder, ScanResult};
pub use tools::{ToolInfo, ToolRegistry};
pub use workspace::Workspace;
