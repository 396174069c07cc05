//! Extend the muted clip to a target duration.
//!
//! Three shapes, chosen by [`LoopPlan::new`]:
//!
//! - **Trim**: one iteration already covers the target, so the clip is cut
//!   with `-t` and stream copy.
//! - **Lossless**: a concat-demuxer manifest repeats the clip `loop_count`
//!   times, stream-copied and cut to the target.
//! - **Blended**: the clip is fed `loop_count` times and chained through
//!   `xfade`, then re-encoded with libx264.

use std::io;
use std::path::{Path, PathBuf};

use lf_core::config::RenderConfig;
use lf_core::{Error, Result, TransitionMode};

use crate::engine::{EngineInvocation, Transcoder};
use crate::process::RunControl;

pub const LOOPED_VIDEO_FILE: &str = "looped_video.mp4";
pub const CONCAT_MANIFEST_FILE: &str = "concat_list.txt";

/// `ceil(target / unit)`, never below 1.
pub fn loop_count(unit: f64, target: f64) -> Result<u32> {
    if !(unit.is_finite() && unit > 0.0) {
        return Err(Error::Validation(format!("invalid clip duration {unit}")));
    }
    if !(target.is_finite() && target > 0.0) {
        return Err(Error::Validation(format!("invalid target duration {target}")));
    }
    let count = (target / unit).ceil();
    if count > u32::MAX as f64 {
        return Err(Error::Validation(format!(
            "target {target}s needs too many iterations of a {unit}s clip"
        )));
    }
    Ok((count as u32).max(1))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopStrategy {
    Trim,
    Lossless,
    Blended {
        effect: &'static str,
        transition: f64,
    },
}

/// Why a blended transition was dropped in favour of the lossless concat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopFallback {
    /// The configured transition duration is zero or negative.
    NonPositiveTransition,
    /// Each iteration is no longer than the transition.
    ClipTooShort,
}

/// How the loop render will be carried out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopPlan {
    pub unit: f64,
    pub target: f64,
    pub loop_count: u32,
    pub strategy: LoopStrategy,
    /// Set when a blended mode was requested but could not be honoured.
    pub fallback: Option<LoopFallback>,
}

impl LoopPlan {
    /// Pick a strategy for extending a `unit`-second clip to `target`
    /// seconds.
    ///
    /// A blended loop needs every iteration to outlast the cross-fade; when
    /// it does not, the plan falls back to the lossless concat.
    pub fn new(unit: f64, target: f64, mode: TransitionMode, transition: f64) -> Result<Self> {
        let loop_count = loop_count(unit, target)?;
        let mut fallback = None;
        let strategy = if loop_count == 1 {
            LoopStrategy::Trim
        } else if !mode.is_blended() {
            LoopStrategy::Lossless
        } else if transition <= 0.0 {
            tracing::warn!(transition, "transition duration is not positive; using lossless loop");
            fallback = Some(LoopFallback::NonPositiveTransition);
            LoopStrategy::Lossless
        } else if unit <= transition {
            tracing::warn!(
                unit,
                transition,
                "clip is not longer than the transition; using lossless loop"
            );
            fallback = Some(LoopFallback::ClipTooShort);
            LoopStrategy::Lossless
        } else {
            LoopStrategy::Blended {
                effect: mode.xfade_effect(),
                transition,
            }
        };

        Ok(Self {
            unit,
            target,
            loop_count,
            strategy,
            fallback,
        })
    }
}

/// Concat-demuxer manifest listing `path` `count` times.
///
/// Backslashes become forward slashes and single quotes are escaped the
/// way the demuxer expects.
pub fn concat_manifest(path: &Path, count: u32) -> String {
    let normalized = path
        .to_string_lossy()
        .replace('\\', "/")
        .replace('\'', r"'\''");
    let line = format!("file '{normalized}'\n");
    line.repeat(count as usize)
}

/// Offsets of the `loop_count - 1` cross-fades: `unit*(k+1) - d*(k+1)`.
pub fn xfade_offsets(unit: f64, transition: f64, loop_count: u32) -> Vec<f64> {
    (1..loop_count)
        .map(|k| {
            let k = f64::from(k);
            unit * k - transition * k
        })
        .collect()
}

/// Chained `xfade` graph over inputs `0..loop_count` and the label of its
/// final output.
pub fn xfade_filter(effect: &str, unit: f64, transition: f64, loop_count: u32) -> (String, String) {
    let offsets = xfade_offsets(unit, transition, loop_count);
    let mut graph = String::new();
    for (i, offset) in offsets.iter().enumerate() {
        let left = if i == 0 {
            "[0:v]".to_string()
        } else {
            format!("[v{i}]")
        };
        if i > 0 {
            graph.push(';');
        }
        graph.push_str(&format!(
            "{left}[{next}:v]xfade=transition={effect}:duration={transition}:offset={offset}[v{next}]",
            next = i + 1
        ));
    }
    let last = format!("[v{}]", offsets.len());
    (graph, last)
}

/// Build the render invocation. `manifest` is only used by the lossless
/// strategy.
pub fn loop_invocation(
    plan: &LoopPlan,
    input: &Path,
    manifest: &Path,
    output: &Path,
    render: &RenderConfig,
) -> EngineInvocation {
    let target = plan.target.to_string();
    let inv = EngineInvocation::new("loop-video", output).timeout(render.loop_timeout());

    match plan.strategy {
        LoopStrategy::Trim => inv
            .input(input)
            .output_options(["-t", target.as_str(), "-c:v", "copy"]),
        LoopStrategy::Lossless => inv
            .input_with(["-f", "concat", "-safe", "0"], manifest)
            .output_options(["-t", target.as_str(), "-c:v", "copy"]),
        LoopStrategy::Blended { effect, transition } => {
            let (graph, last) = xfade_filter(effect, plan.unit, transition, plan.loop_count);
            let crf = render.video_crf.to_string();
            (0..plan.loop_count)
                .fold(inv, |inv, _| inv.input(input))
                .filter_complex(graph)
                .map(last)
                .output_options([
                    "-t",
                    target.as_str(),
                    "-c:v",
                    render.video_codec.as_str(),
                    "-preset",
                    render.video_preset.as_str(),
                    "-crf",
                    crf.as_str(),
                ])
        }
    }
}

/// Removes the concat manifest when dropped.
struct ManifestGuard(PathBuf);

impl Drop for ManifestGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => tracing::debug!(path = %self.0.display(), "concat manifest removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.0.display(), "failed to remove concat manifest: {e}"),
        }
    }
}

/// Files a loop render reads and writes.
#[derive(Debug, Clone, Copy)]
pub struct LoopPaths<'a> {
    /// The muted clip.
    pub input: &'a Path,
    /// Directory the concat manifest is written to.
    pub workspace_dir: &'a Path,
    pub output: &'a Path,
}

/// Render the loop described by `plan`.
///
/// The lossless strategy writes its manifest into the workspace and removes
/// it again whether the render succeeds or fails.
pub async fn render_loop(
    engine: &dyn Transcoder,
    control: &RunControl,
    plan: &LoopPlan,
    paths: LoopPaths<'_>,
    render: &RenderConfig,
    on_progress: &(dyn Fn(f64) + Send + Sync),
) -> Result<()> {
    let LoopPaths {
        input,
        workspace_dir,
        output,
    } = paths;
    let manifest = workspace_dir.join(CONCAT_MANIFEST_FILE);
    let _guard = if plan.strategy == LoopStrategy::Lossless {
        tokio::fs::write(&manifest, concat_manifest(input, plan.loop_count)).await?;
        Some(ManifestGuard(manifest.clone()))
    } else {
        None
    };

    tracing::info!(
        loop_count = plan.loop_count,
        strategy = ?plan.strategy,
        target = plan.target,
        "rendering loop"
    );
    let inv = loop_invocation(plan, input, &manifest, output, render);
    engine.run(&inv, control, on_progress).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_count_rounds_up() {
        assert_eq!(loop_count(10.0, 25.0).unwrap(), 3);
        assert_eq!(loop_count(10.0, 10.0).unwrap(), 1);
        assert_eq!(loop_count(10.0, 15.0).unwrap(), 2);
        assert_eq!(loop_count(10.0, 3.0).unwrap(), 1);
        assert!(loop_count(0.0, 3.0).is_err());
        assert!(loop_count(10.0, f64::NAN).is_err());
    }

    #[test]
    fn single_iteration_trims_regardless_of_mode() {
        for mode in TransitionMode::ALL {
            let plan = LoopPlan::new(10.0, 10.0, mode, 1.0).unwrap();
            assert_eq!(plan.strategy, LoopStrategy::Trim);
        }
    }

    #[test]
    fn strategy_selection() {
        let plan = LoopPlan::new(10.0, 25.0, TransitionMode::None, 1.0).unwrap();
        assert_eq!(plan.strategy, LoopStrategy::Lossless);

        let plan = LoopPlan::new(10.0, 25.0, TransitionMode::BlurFade, 1.0).unwrap();
        assert_eq!(
            plan.strategy,
            LoopStrategy::Blended {
                effect: "circleopen",
                transition: 1.0
            }
        );

        let plan = LoopPlan::new(0.8, 25.0, TransitionMode::Fade, 1.0).unwrap();
        assert_eq!(plan.strategy, LoopStrategy::Lossless);
        assert_eq!(plan.fallback, Some(LoopFallback::ClipTooShort));
    }

    #[test]
    fn non_positive_transition_has_its_own_fallback() {
        for transition in [0.0, -1.0] {
            let plan = LoopPlan::new(10.0, 25.0, TransitionMode::Zoom, transition).unwrap();
            assert_eq!(plan.strategy, LoopStrategy::Lossless);
            assert_eq!(plan.fallback, Some(LoopFallback::NonPositiveTransition));
        }

        let plan = LoopPlan::new(10.0, 25.0, TransitionMode::None, 0.0).unwrap();
        assert_eq!(plan.fallback, None);
    }

    #[test]
    fn manifest_lines() {
        let m = concat_manifest(Path::new(r"C:\work\temp_1\muted_video.mp4"), 3);
        assert_eq!(m.lines().count(), 3);
        assert!(m
            .lines()
            .all(|l| l == "file 'C:/work/temp_1/muted_video.mp4'"));
    }

    #[test]
    fn manifest_escapes_quotes() {
        let m = concat_manifest(Path::new("/w/it's.mp4"), 1);
        assert_eq!(m, "file '/w/it'\\''s.mp4'\n");
    }

    #[test]
    fn offsets_for_three_iterations() {
        assert_eq!(xfade_offsets(10.0, 1.0, 3), vec![9.0, 18.0]);
        assert_eq!(xfade_offsets(10.0, 1.0, 1), Vec::<f64>::new());
    }

    #[test]
    fn xfade_graph_chains_labels() {
        let (graph, last) = xfade_filter("fade", 10.0, 1.0, 3);
        assert_eq!(
            graph,
            "[0:v][1:v]xfade=transition=fade:duration=1:offset=9[v1];\
             [v1][2:v]xfade=transition=fade:duration=1:offset=18[v2]"
        );
        assert_eq!(last, "[v2]");
    }

    #[test]
    fn blended_invocation_reencodes() {
        let plan = LoopPlan::new(10.0, 25.0, TransitionMode::SlideLeft, 1.0).unwrap();
        let inv = loop_invocation(
            &plan,
            Path::new("/w/muted_video.mp4"),
            Path::new("/w/concat_list.txt"),
            Path::new("/w/looped_video.mp4"),
            &RenderConfig::default(),
        );
        assert_eq!(inv.inputs.len(), 3);
        assert_eq!(inv.maps, vec!["[v2]"]);
        assert!(inv.filter_complex.as_deref().unwrap().contains("slideleft"));
        assert_eq!(
            inv.output_options,
            vec!["-t", "25", "-c:v", "libx264", "-preset", "fast", "-crf", "23"]
        );
    }

    #[test]
    fn lossless_invocation_uses_demuxer() {
        let plan = LoopPlan::new(10.0, 25.5, TransitionMode::None, 1.0).unwrap();
        let inv = loop_invocation(
            &plan,
            Path::new("/w/muted_video.mp4"),
            Path::new("/w/concat_list.txt"),
            Path::new("/w/looped_video.mp4"),
            &RenderConfig::default(),
        );
        assert_eq!(inv.inputs.len(), 1);
        assert_eq!(inv.inputs[0].options, vec!["-f", "concat", "-safe", "0"]);
        assert_eq!(inv.inputs[0].path, Path::new("/w/concat_list.txt"));
        assert_eq!(inv.output_options, vec!["-t", "25.5", "-c:v", "copy"]);
    }

    #[test]
    fn trim_invocation_copies_source() {
        let plan = LoopPlan::new(30.0, 12.0, TransitionMode::Fade, 1.0).unwrap();
        let inv = loop_invocation(
            &plan,
            Path::new("/w/muted_video.mp4"),
            Path::new("/w/concat_list.txt"),
            Path::new("/w/looped_video.mp4"),
            &RenderConfig::default(),
        );
        assert_eq!(inv.inputs[0].path, Path::new("/w/muted_video.mp4"));
        assert!(inv.filter_complex.is_none());
        assert_eq!(inv.output_options, vec!["-t", "12", "-c:v", "copy"]);
    }

    #[test]
    fn manifest_guard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONCAT_MANIFEST_FILE);
        std::fs::write(&path, "file 'x'\n").unwrap();
        drop(ManifestGuard(path.clone()));
        assert!(!path.exists());
        // Missing file is not an error.
        drop(ManifestGuard(path));
    }
}
