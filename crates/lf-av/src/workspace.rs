//! Per-job temporary directory.
//!
//! A [`Workspace`] is a `temp_<millis>` directory created inside the job's
//! output folder. It holds the merged audio, the muted and looped video and
//! the concat manifest, and is removed when dropped, so every exit path of a
//! job (success, failure, abort, panic unwinding) cleans it up.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use lf_core::{Error, Result};
use tempfile::TempDir;

/// Temporary directory owned by exactly one job.
///
/// # Example
///
/// ```no_run
/// use lf_av::Workspace;
///
/// let ws = Workspace::create(std::path::Path::new("/videos/out"), chrono::Utc::now()).unwrap();
/// let merged = ws.path().join("merged_audio.m4a");
/// // ... run the pipeline ...
/// ws.close().unwrap();
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Create `temp_<millis>` inside `output_folder`, named from the
    /// submission time. If that name is taken a random suffix is appended.
    pub fn create(output_folder: &Path, submitted_at: DateTime<Utc>) -> Result<Self> {
        let prefix = format!("temp_{}", submitted_at.timestamp_millis());

        let exact = tempfile::Builder::new()
            .prefix(&prefix)
            .rand_bytes(0)
            .tempdir_in(output_folder);

        let temp_dir = match exact {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => tempfile::Builder::new()
                .prefix(&format!("{prefix}_"))
                .rand_bytes(6)
                .tempdir_in(output_folder)
                .map_err(|e| workspace_error(output_folder, e))?,
            Err(e) => return Err(workspace_error(output_folder, e)),
        };

        tracing::debug!(path = %temp_dir.path().display(), "workspace created");
        Ok(Self { temp_dir })
    }

    /// Path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Delete the workspace now, reporting any failure. Dropping the
    /// workspace does the same but swallows errors.
    pub fn close(self) -> Result<()> {
        let path = self.temp_dir.path().to_path_buf();
        self.temp_dir.close()?;
        tracing::debug!(path = %path.display(), "workspace removed");
        Ok(())
    }
}

fn workspace_error(output_folder: &Path, e: io::Error) -> Error {
    Error::Validation(format!(
        "cannot create workspace in {}: {e}",
        output_folder.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn named_from_submission_time() {
        let out = tempfile::tempdir().unwrap();
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let ws = Workspace::create(out.path(), at).unwrap();
        assert_eq!(ws.path().parent().unwrap(), out.path());
        assert_eq!(ws.path().file_name().unwrap(), "temp_1700000000123");
    }

    #[test]
    fn collision_gets_suffix() {
        let out = tempfile::tempdir().unwrap();
        let at = Utc.timestamp_millis_opt(42).unwrap();
        let first = Workspace::create(out.path(), at).unwrap();
        let second = Workspace::create(out.path(), at).unwrap();
        assert_ne!(first.path(), second.path());
        let name = second.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("temp_42_"), "got {name}");
    }

    #[test]
    fn drop_and_close_remove_directory() {
        let out = tempfile::tempdir().unwrap();

        let ws = Workspace::create(out.path(), Utc::now()).unwrap();
        let path = ws.path().to_path_buf();
        std::fs::write(ws.path().join("muted_video.mp4"), b"x").unwrap();
        drop(ws);
        assert!(!path.exists());

        let ws = Workspace::create(out.path(), Utc::now()).unwrap();
        let path = ws.path().to_path_buf();
        ws.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn missing_output_folder_is_validation_error() {
        let out = tempfile::tempdir().unwrap();
        let err = Workspace::create(&out.path().join("nope"), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }
}
