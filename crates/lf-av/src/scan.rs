//! Media folder listing for the CLI.

use std::path::Path;

use lf_core::config::ScanConfig;
use lf_core::{Error, MediaFile, Result};
use serde::Serialize;
use walkdir::WalkDir;

/// Media files found directly inside a folder, each list sorted by name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    pub videos: Vec<MediaFile>,
    pub audios: Vec<MediaFile>,
}

/// List the regular files in `dir` (non-recursive) and classify them by
/// lowercase extension.
pub fn scan_folder(dir: &Path, cfg: &ScanConfig) -> Result<ScanResult> {
    if !dir.is_dir() {
        return Err(Error::Validation(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut result = ScanResult::default();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("skipping unreadable entry in {}: {e}", dir.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(ext) = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
        else {
            continue;
        };

        let file = MediaFile::from_path(entry.path());
        if cfg.video_extensions.iter().any(|v| v.eq_ignore_ascii_case(&ext)) {
            result.videos.push(file);
        } else if cfg.audio_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)) {
            result.audios.push(file);
        }
    }

    result.videos.sort_by(|a, b| a.name.cmp(&b.name));
    result.audios.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!(
        dir = %dir.display(),
        videos = result.videos.len(),
        audios = result.audios.len(),
        "folder scanned"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn classifies_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.MP3", "a.wav", "clip.mp4", "other.MKV", "notes.txt", "noext"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("nested.mp4")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("deep.mp3"), b"").unwrap();

        let res = scan_folder(dir.path(), &ScanConfig::default()).unwrap();
        let videos: Vec<&str> = res.videos.iter().map(|f| f.name.as_str()).collect();
        let audios: Vec<&str> = res.audios.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(videos, vec!["clip.mp4", "other.MKV"]);
        assert_eq!(audios, vec!["a.wav", "b.MP3"]);
    }

    #[test]
    fn custom_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.opus"), b"").unwrap();
        let cfg = ScanConfig {
            video_extensions: vec![],
            audio_extensions: vec!["opus".into()],
        };
        let res = scan_folder(dir.path(), &cfg).unwrap();
        assert_eq!(res.audios.len(), 1);
    }

    #[test]
    fn not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_folder(&dir.path().join("missing"), &ScanConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }
}
