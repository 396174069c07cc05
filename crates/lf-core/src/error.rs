//! Unified error type for loopforge.
//!
//! Every stage funnels its failures into [`Error`]. The first five variants
//! form the job-level taxonomy reported to callers; the rest cover ambient
//! failures (tool discovery, I/O, busy controller).

use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Unified error type covering all failure modes in loopforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid processing options.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A media file could not be inspected (missing, unreadable, corrupt, or
    /// no duration reported).
    #[error("Cannot read media {path}: {message}")]
    MediaRead {
        /// The file that was probed.
        path: String,
        /// Human-readable error description.
        message: String,
    },

    /// The transcoding engine reported a failure.
    #[error("Engine error [{tool}]: {message}")]
    Engine {
        /// Name of the tool that failed (e.g. "ffmpeg").
        tool: String,
        /// Human-readable error description.
        message: String,
        /// Tail of the engine's diagnostic stream. Informational only.
        diagnostics: String,
    },

    /// A stage exceeded its wall-clock budget.
    #[error("Timeout: {stage} exceeded {after:?}")]
    Timeout {
        /// The stage or tool that timed out.
        stage: String,
        /// The budget that was exceeded.
        after: Duration,
    },

    /// The user cancelled the job.
    #[error("Operation aborted by user")]
    Aborted,

    /// A job is already running on this controller.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An external tool is missing or could not be started.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short machine-friendly name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::MediaRead { .. } => "media_read",
            Error::Engine { .. } => "engine",
            Error::Timeout { .. } => "timeout",
            Error::Aborted => "aborted",
            Error::Conflict(_) => "conflict",
            Error::Tool { .. } => "tool",
            Error::Io { .. } => "io",
            Error::Internal(_) => "internal",
        }
    }

    /// User-facing troubleshooting hint for the final summary log entry.
    pub fn troubleshooting(&self) -> &'static str {
        match self {
            Error::Validation(_) => {
                "Check that the source and output folders exist and that enough audio files are selected."
            }
            Error::MediaRead { .. } => {
                "Make sure the file exists, is fully copied, and plays in a media player."
            }
            Error::Engine { .. } => {
                "Check the engine diagnostics above; the input may use an unsupported codec or be corrupt."
            }
            Error::Timeout { .. } => {
                "Try fewer or shorter audio files, or raise the configured timeout."
            }
            Error::Aborted => "The job was cancelled; no output was written.",
            Error::Conflict(_) => "Wait for the running job to finish or abort it first.",
            Error::Tool { .. } => {
                "Install ffmpeg and ffprobe, or point tools.ffmpeg_path / tools.ffprobe_path at them."
            }
            Error::Io { .. } => "Check free disk space and write permissions on the output folder.",
            Error::Internal(_) => "This is a bug; please report it with the log output.",
        }
    }

    /// Whether this error represents a user-initiated cancellation.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Aborted)
    }

    /// Convenience constructor for [`Error::MediaRead`].
    pub fn media_read(path: &Path, message: impl fmt::Display) -> Self {
        Error::MediaRead {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Engine`].
    pub fn engine(
        tool: impl Into<String>,
        message: impl Into<String>,
        diagnostics: impl Into<String>,
    ) -> Self {
        Error::Engine {
            tool: tool.into(),
            message: message.into(),
            diagnostics: diagnostics.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Timeout`].
    pub fn timeout(stage: impl Into<String>, after: Duration) -> Self {
        Error::Timeout {
            stage: stage.into(),
            after,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display() {
        let err = Error::Validation("output folder does not exist".into());
        assert_eq!(
            err.to_string(),
            "Validation error: output folder does not exist"
        );
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn media_read_display() {
        let err = Error::media_read(Path::new("/media/clip.mp4"), "no duration");
        assert_eq!(err.to_string(), "Cannot read media /media/clip.mp4: no duration");
        assert_eq!(err.kind(), "media_read");
    }

    #[test]
    fn engine_display_omits_diagnostics() {
        let err = Error::engine("ffmpeg", "exited with status 1", "Invalid data found");
        assert_eq!(err.to_string(), "Engine error [ffmpeg]: exited with status 1");
        match err {
            Error::Engine { diagnostics, .. } => assert_eq!(diagnostics, "Invalid data found"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn timeout_display() {
        let err = Error::timeout("merge-audio", Duration::from_secs(1800));
        assert_eq!(err.to_string(), "Timeout: merge-audio exceeded 1800s");
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn aborted_display() {
        let err = Error::Aborted;
        assert_eq!(err.to_string(), "Operation aborted by user");
        assert!(err.is_aborted());
        assert!(!Error::Internal("x".into()).is_aborted());
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffprobe", "ffprobe not found");
        assert_eq!(err.to_string(), "Tool error [ffprobe]: ffprobe not found");
    }

    #[test]
    fn every_kind_has_hint() {
        let errors = vec![
            Error::Validation("v".into()),
            Error::media_read(Path::new("a"), "b"),
            Error::engine("ffmpeg", "m", ""),
            Error::timeout("s", Duration::from_secs(1)),
            Error::Aborted,
            Error::Conflict("busy".into()),
            Error::tool("ffmpeg", "missing"),
            Error::Internal("boom".into()),
        ];
        for e in &errors {
            assert!(!e.troubleshooting().is_empty(), "no hint for {}", e.kind());
        }
    }
}
