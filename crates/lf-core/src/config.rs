//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON or TOML and
//! carries the tool overrides, render parameters and folder-scan rules.
//! Every section defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub render: RenderConfig,
    pub scan: ScanConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file, choosing the format by extension.
    /// `.toml` files are parsed as TOML, everything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml(&contents)
        } else {
            Self::from_json(&contents)
        }
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None`, the file does not exist, or it fails to parse.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(Error::Io { source }) if source.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to load config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.render.video_crf > 51 {
            warnings.push(format!(
                "render.video_crf {} is outside the x264 range 0-51",
                self.render.video_crf
            ));
        }

        let presets = [
            "ultrafast",
            "superfast",
            "veryfast",
            "faster",
            "fast",
            "medium",
            "slow",
            "slower",
            "veryslow",
            "placebo",
        ];
        if !presets.contains(&self.render.video_preset.as_str()) {
            warnings.push(format!(
                "render.video_preset '{}' is not a recognized x264 preset",
                self.render.video_preset
            ));
        }

        if self.render.transition_secs <= 0.0 {
            warnings.push(
                "render.transition_secs must be positive; blended transitions fall back to a lossless loop"
                    .into(),
            );
        }

        if self.render.merge_timeout_secs == 0 {
            warnings.push("render.merge_timeout_secs is 0; audio merge will time out immediately".into());
        }

        if self.render.product_tag.trim().is_empty() {
            warnings.push("render.product_tag is empty".into());
        }

        if self.scan.video_extensions.is_empty() {
            warnings.push("scan.video_extensions is empty; no videos will be found".into());
        }
        if self.scan.audio_extensions.is_empty() {
            warnings.push("scan.audio_extensions is empty; no audio will be found".into());
        }

        for (name, path) in [
            ("tools.ffmpeg_path", &self.tools.ffmpeg_path),
            ("tools.ffprobe_path", &self.tools.ffprobe_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!("{name} {} does not exist", p.display()));
                }
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Explicit paths for external tools. `None` means search `PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Encoding parameters and stage budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub video_codec: String,
    pub video_preset: String,
    pub video_crf: u32,
    /// Cross-fade length in seconds for blended loops.
    pub transition_secs: f64,
    /// Hard wall-clock limit for the audio merge.
    pub merge_timeout_secs: u64,
    /// Optional limit for the loop render. Unbounded when unset.
    pub loop_timeout_secs: Option<u64>,
    /// Optional limit for the final mux. Unbounded when unset.
    pub final_timeout_secs: Option<u64>,
    /// Tag embedded in output file names.
    pub product_tag: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            audio_codec: "aac".into(),
            audio_bitrate: "192k".into(),
            video_codec: "libx264".into(),
            video_preset: "fast".into(),
            video_crf: 23,
            transition_secs: 1.0,
            merge_timeout_secs: 30 * 60,
            loop_timeout_secs: None,
            final_timeout_secs: None,
            product_tag: "LOOPFORGE".into(),
        }
    }
}

impl RenderConfig {
    pub fn merge_timeout(&self) -> Duration {
        Duration::from_secs(self.merge_timeout_secs)
    }

    pub fn loop_timeout(&self) -> Option<Duration> {
        self.loop_timeout_secs.map(Duration::from_secs)
    }

    pub fn final_timeout(&self) -> Option<Duration> {
        self.final_timeout_secs.map(Duration::from_secs)
    }
}

/// File-type classification for folder scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub video_extensions: Vec<String>,
    pub audio_extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            video_extensions: ["mp4", "mkv", "mov", "avi", "webm", "flv"]
                .map(String::from)
                .to_vec(),
            audio_extensions: ["mp3", "wav", "m4a", "aac", "ogg", "flac"]
                .map(String::from)
                .to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.render.audio_codec, "aac");
        assert_eq!(cfg.render.audio_bitrate, "192k");
        assert_eq!(cfg.render.video_preset, "fast");
        assert_eq!(cfg.render.video_crf, 23);
        assert_eq!(cfg.render.merge_timeout(), Duration::from_secs(1800));
        assert!(cfg.render.loop_timeout().is_none());
        assert!(cfg.tools.ffmpeg_path.is_none());
        assert!(cfg.scan.video_extensions.contains(&"mkv".to_string()));
    }

    #[test]
    fn default_config_no_warnings() {
        let cfg = Config::default();
        let warnings = cfg.validate();
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn bad_preset_and_crf_warn() {
        let mut cfg = Config::default();
        cfg.render.video_preset = "ludicrous".into();
        cfg.render.video_crf = 60;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("video_preset")));
        assert!(warnings.iter().any(|w| w.contains("video_crf")));
    }

    #[test]
    fn missing_tool_override_warns() {
        let mut cfg = Config::default();
        cfg.tools.ffmpeg_path = Some(PathBuf::from("/definitely/not/here/ffmpeg"));
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("tools.ffmpeg_path")));
    }

    #[test]
    fn parse_json_config() {
        let json = r#"{"render": {"video_crf": 18, "loop_timeout_secs": 600}}"#;
        let cfg = Config::from_json(json).unwrap();
        assert_eq!(cfg.render.video_crf, 18);
        assert_eq!(cfg.render.loop_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(cfg.render.video_preset, "fast");
    }

    #[test]
    fn parse_empty_json_uses_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.render.product_tag, "LOOPFORGE");
        assert_eq!(cfg.scan.audio_extensions.len(), 6);
    }

    #[test]
    fn parse_toml_config() {
        let toml = r#"
[render]
product_tag = "DEMO"
transition_secs = 0.5

[scan]
audio_extensions = ["mp3"]
"#;
        let cfg = Config::from_toml(toml).unwrap();
        assert_eq!(cfg.render.product_tag, "DEMO");
        assert_eq!(cfg.render.transition_secs, 0.5);
        assert_eq!(cfg.scan.audio_extensions, vec!["mp3".to_string()]);
    }

    #[test]
    fn invalid_json_is_validation_error() {
        let err = Config::from_json("{not json").unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("loopforge.toml");
        std::fs::write(&toml_path, "[render]\nvideo_crf = 20\n").unwrap();
        assert_eq!(Config::load(&toml_path).unwrap().render.video_crf, 20);

        let json_path = dir.path().join("loopforge.json");
        std::fs::write(&json_path, r#"{"render":{"video_crf":21}}"#).unwrap();
        assert_eq!(Config::load(&json_path).unwrap().render.video_crf, 21);
    }

    #[test]
    fn load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_or_default(Some(&dir.path().join("absent.json")));
        assert_eq!(cfg.render.video_crf, 23);
        assert_eq!(Config::load_or_default(None).render.video_crf, 23);
    }
}
