//! Job request and result model: media files, transition modes, processing
//! options, pipeline stages and run statistics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// MediaFile
// ---------------------------------------------------------------------------

/// A candidate input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub name: String,
    pub path: PathBuf,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Build a `MediaFile` whose name is the path's file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }
}

// ---------------------------------------------------------------------------
// TransitionMode
// ---------------------------------------------------------------------------

/// How successive iterations of the looped clip are joined.
///
/// `None` selects the lossless concat path; every other mode renders a
/// cross-fade with the engine's `xfade` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransitionMode {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "fade")]
    Fade,
    #[serde(rename = "fadeblack")]
    FadeBlack,
    #[serde(rename = "slideLeft")]
    SlideLeft,
    #[serde(rename = "slideRight")]
    SlideRight,
    #[serde(rename = "blurFade")]
    BlurFade,
    #[serde(rename = "zoom")]
    Zoom,
}

impl TransitionMode {
    pub const ALL: [TransitionMode; 7] = [
        Self::None,
        Self::Fade,
        Self::FadeBlack,
        Self::SlideLeft,
        Self::SlideRight,
        Self::BlurFade,
        Self::Zoom,
    ];

    /// Whether this mode renders a cross-fade instead of a lossless concat.
    pub fn is_blended(self) -> bool {
        !matches!(self, Self::None)
    }

    /// The `xfade` effect name used for this mode. Modes without a direct
    /// engine counterpart fall back to `fade`.
    pub fn xfade_effect(self) -> &'static str {
        match self {
            Self::FadeBlack => "fadeblack",
            Self::SlideLeft => "slideleft",
            Self::SlideRight => "slideright",
            Self::BlurFade => "circleopen",
            Self::None | Self::Fade | Self::Zoom => "fade",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fade => "fade",
            Self::FadeBlack => "fadeblack",
            Self::SlideLeft => "slideLeft",
            Self::SlideRight => "slideRight",
            Self::BlurFade => "blurFade",
            Self::Zoom => "zoom",
        }
    }
}

impl fmt::Display for TransitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionMode {
    type Err = Error;

    /// Case-insensitive; accepts `slideLeft`, `slideleft` and `slide-left`.
    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(&key))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown transition '{s}' (valid: {})",
                    Self::ALL.map(Self::as_str).join(", ")
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// ProcessingOptions
// ---------------------------------------------------------------------------

/// A job request. Validated once at submission and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingOptions {
    pub source_folder: PathBuf,
    pub output_folder: PathBuf,
    pub selected_video: MediaFile,
    pub audio_files: Vec<MediaFile>,
    pub audio_count: usize,
    #[serde(default)]
    pub randomize_audio: bool,
    #[serde(default)]
    pub transition_mode: TransitionMode,
}

impl ProcessingOptions {
    /// Check the request before any work starts.
    ///
    /// Media files themselves are not opened here; unreadable inputs surface
    /// as [`Error::MediaRead`] from the probe stage.
    pub fn validate(&self) -> Result<()> {
        if self.selected_video.path.as_os_str().is_empty() {
            return Err(Error::Validation("no source video selected".into()));
        }
        if self.audio_files.is_empty() {
            return Err(Error::Validation("no audio files provided".into()));
        }
        if self.audio_count == 0 {
            return Err(Error::Validation("audio_count must be at least 1".into()));
        }
        if self.audio_count > self.audio_files.len() {
            return Err(Error::Validation(format!(
                "audio_count {} exceeds the {} available audio files",
                self.audio_count,
                self.audio_files.len()
            )));
        }
        if !self.source_folder.is_dir() {
            return Err(Error::Validation(format!(
                "source folder {} does not exist or is not a directory",
                self.source_folder.display()
            )));
        }
        if !self.output_folder.is_dir() {
            return Err(Error::Validation(format!(
                "output folder {} does not exist or is not a directory",
                self.output_folder.display()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Pipeline position of a job. Moves strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Probe,
    SelectAudio,
    MergeAudio,
    MuteVideo,
    LoopVideo,
    MergeFinal,
    Done,
    Aborted,
    Failed,
}

impl Stage {
    /// The working stages in execution order.
    pub const PIPELINE: [Stage; 6] = [
        Self::Probe,
        Self::SelectAudio,
        Self::MergeAudio,
        Self::MuteVideo,
        Self::LoopVideo,
        Self::MergeFinal,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::SelectAudio => "select-audio",
            Self::MergeAudio => "merge-audio",
            Self::MuteVideo => "mute-video",
            Self::LoopVideo => "loop-video",
            Self::MergeFinal => "merge-final",
            Self::Done => "done",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Summary numbers for a finished job. Durations are in seconds, rounded to
/// two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    pub audio_count: usize,
    pub total_audio_duration: f64,
    pub original_video_duration: f64,
    /// Equal to the merged audio duration.
    pub final_video_duration: f64,
    pub loop_count: u32,
}

impl JobStats {
    pub fn new(audio_count: usize, audio_duration: f64, video_duration: f64, loop_count: u32) -> Self {
        Self {
            audio_count,
            total_audio_duration: round2(audio_duration),
            original_video_duration: round2(video_duration),
            final_video_duration: round2(audio_duration),
            loop_count,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Successful job response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub success: bool,
    pub output_path: PathBuf,
    pub stats: JobStats,
}

impl ProcessingResult {
    pub fn new(output_path: impl AsRef<Path>, stats: JobStats) -> Self {
        Self {
            success: true,
            output_path: output_path.as_ref().to_path_buf(),
            stats,
        }
    }
}
