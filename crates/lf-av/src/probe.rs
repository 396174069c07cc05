//! Media duration probing.
//!
//! [`DurationProbe`] is the seam the pipeline uses to ask how long a file
//! is. [`FfprobeProber`] implements it by shelling out to
//! `ffprobe -v error -print_format json -show_format` and reading
//! `format.duration`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lf_core::{Error, Result};
use serde::Deserialize;

use crate::command::ToolCommand;

/// Something that can report a media file's duration in seconds.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Duration of `path` in seconds. Always positive and finite on success.
    ///
    /// Fails with [`Error::MediaRead`] if the file is missing, unreadable,
    /// or reports no usable duration.
    async fn duration(&self, path: &Path) -> Result<f64>;
}

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }
}

#[async_trait]
impl DurationProbe for FfprobeProber {
    async fn duration(&self, path: &Path) -> Result<f64> {
        if !path.is_file() {
            return Err(Error::media_read(path, "file does not exist"));
        }

        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args(["-v", "error", "-print_format", "json", "-show_format"]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd.execute().await.map_err(|e| match e {
            Error::Engine { diagnostics, .. } if !diagnostics.is_empty() => {
                Error::media_read(path, diagnostics)
            }
            Error::Tool { .. } => e,
            other => Error::media_read(path, other),
        })?;

        parse_duration(path, &output.stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Extract `format.duration` from ffprobe JSON output.
pub fn parse_duration(path: &Path, json: &str) -> Result<f64> {
    let ff: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::media_read(path, format!("ffprobe JSON parse error: {e}")))?;

    let raw = ff
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| Error::media_read(path, "no duration reported"))?;

    match raw.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(secs),
        Ok(secs) => Err(Error::media_read(path, format!("invalid duration {secs}"))),
        Err(_) => Err(Error::media_read(path, format!("unparsable duration '{raw}'"))),
    }
}
