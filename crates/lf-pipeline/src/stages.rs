//! Built-in stages, in execution order.

use async_trait::async_trait;
use chrono::Utc;
use lf_av::actions::{
    final_output_name, merge_audio, mute_video, mux_final, render_loop, LoopFallback, LoopPaths,
    LoopPlan, LoopStrategy, LOOPED_VIDEO_FILE, MERGED_AUDIO_FILE, MUTED_VIDEO_FILE,
};
use lf_core::{format_duration, Result, Stage};

use crate::context::{JobState, StageContext};
use crate::selector::select_audio;
use crate::stage::PipelineStage;

/// The six stages of a job, in order.
pub fn standard_stages() -> Vec<Box<dyn PipelineStage>> {
    vec![
        Box::new(ProbeStage),
        Box::new(SelectAudioStage),
        Box::new(MergeAudioStage),
        Box::new(MuteVideoStage),
        Box::new(LoopVideoStage),
        Box::new(MergeFinalStage),
    ]
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// Read the source clip's duration.
pub struct ProbeStage;

#[async_trait]
impl PipelineStage for ProbeStage {
    fn stage(&self) -> Stage {
        Stage::Probe
    }

    async fn execute(&self, ctx: &StageContext, state: &mut JobState) -> Result<()> {
        ctx.reporter.progress(Stage::Probe, 33.0, "Analysing video");
        let duration = ctx.probe_duration(&ctx.options.selected_video.path).await?;
        ctx.reporter
            .info(format!("Video duration: {}", format_duration(duration)));
        state.video_duration = Some(duration);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SelectAudio
// ---------------------------------------------------------------------------

pub struct SelectAudioStage;

#[async_trait]
impl PipelineStage for SelectAudioStage {
    fn stage(&self) -> Stage {
        Stage::SelectAudio
    }

    async fn execute(&self, ctx: &StageContext, state: &mut JobState) -> Result<()> {
        ctx.reporter.progress(Stage::SelectAudio, 0.0, "Selecting audio");
        let opts = &ctx.options;
        let selected = select_audio(&opts.audio_files, opts.audio_count, opts.randomize_audio);

        let order = if opts.randomize_audio { "random" } else { "by name" };
        ctx.reporter
            .info(format!("Selected {} audio files ({order})", selected.len()));
        for (i, file) in selected.iter().enumerate() {
            tracing::debug!(index = i + 1, name = %file.name, "selected audio");
        }
        state.selected_audio = selected;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MergeAudio
// ---------------------------------------------------------------------------

/// Concatenate the selected tracks and measure the result.
pub struct MergeAudioStage;

impl MergeAudioStage {
    /// Sum of the input track durations, or `None` with a warning if any
    /// track cannot be probed.
    async fn input_total(ctx: &StageContext, state: &JobState) -> Result<Option<f64>> {
        let mut total = 0.0;
        for file in &state.selected_audio {
            match ctx.probe_duration(&file.path).await {
                Ok(d) => total += d,
                Err(e) if e.is_aborted() => return Err(e),
                Err(e) => {
                    ctx.reporter.warning(format!(
                        "Could not read duration of {}: {e}; merge progress unavailable",
                        file.name
                    ));
                    return Ok(None);
                }
            }
        }
        Ok(Some(total))
    }
}

#[async_trait]
impl PipelineStage for MergeAudioStage {
    fn stage(&self) -> Stage {
        Stage::MergeAudio
    }

    async fn execute(&self, ctx: &StageContext, state: &mut JobState) -> Result<()> {
        ctx.reporter.progress(Stage::MergeAudio, 0.0, "Merging audio");
        ctx.reporter.info(format!(
            "Merging {} audio files...",
            state.selected_audio.len()
        ));

        let total = Self::input_total(ctx, state).await?;
        state.input_audio_duration = total;

        let output = ctx.workspace_dir.join(MERGED_AUDIO_FILE);
        let on_progress = ctx.engine_progress(Stage::MergeAudio, "Merging audio", 20, total);
        merge_audio(
            ctx.engine.as_ref(),
            &ctx.control,
            &state.selected_audio,
            &output,
            &ctx.render,
            &on_progress,
        )
        .await?;
        ctx.reporter.progress(Stage::MergeAudio, 100.0, "Audio merged");

        let merged = ctx.probe_duration(&output).await?;
        let video = state.video_duration()?;
        let loop_count = lf_av::actions::loop_count(video, merged)?;
        ctx.reporter.success(format!(
            "Audio merged: {}",
            format_duration(merged)
        ));
        if let Some(expected) = total {
            tracing::debug!(expected, merged, "merged audio duration vs sum of inputs");
        }

        state.merged_audio = Some(output);
        state.audio_duration = Some(merged);
        state.loop_count = Some(loop_count);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MuteVideo
// ---------------------------------------------------------------------------

pub struct MuteVideoStage;

#[async_trait]
impl PipelineStage for MuteVideoStage {
    fn stage(&self) -> Stage {
        Stage::MuteVideo
    }

    async fn execute(&self, ctx: &StageContext, state: &mut JobState) -> Result<()> {
        ctx.reporter.progress(Stage::MuteVideo, 20.0, "Removing audio from video");
        let output = ctx.workspace_dir.join(MUTED_VIDEO_FILE);
        mute_video(
            ctx.engine.as_ref(),
            &ctx.control,
            &ctx.options.selected_video.path,
            &output,
        )
        .await?;
        ctx.reporter.progress(Stage::MuteVideo, 100.0, "Video muted");
        ctx.reporter.success("Source audio removed");
        state.muted_video = Some(output);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LoopVideo
// ---------------------------------------------------------------------------

/// Extend the muted clip to the merged audio's length.
pub struct LoopVideoStage;

#[async_trait]
impl PipelineStage for LoopVideoStage {
    fn stage(&self) -> Stage {
        Stage::LoopVideo
    }

    async fn execute(&self, ctx: &StageContext, state: &mut JobState) -> Result<()> {
        ctx.reporter.progress(Stage::LoopVideo, 0.0, "Looping video");
        let input = state.muted_video()?.to_path_buf();
        let target = state.audio_duration()?;
        let unit = ctx.probe_duration(&input).await?;

        let mode = ctx.options.transition_mode;
        let plan = LoopPlan::new(unit, target, mode, ctx.render.transition_secs)?;
        let milestone_step = match plan.strategy {
            LoopStrategy::Trim => {
                ctx.reporter.info(format!(
                    "Video ({}) already covers the audio; trimming to {}",
                    format_duration(unit),
                    format_duration(target)
                ));
                20
            }
            LoopStrategy::Lossless => {
                match plan.fallback {
                    Some(LoopFallback::NonPositiveTransition) => ctx.reporter.warning(format!(
                        "Transition duration must be positive (got {}s); looping without '{mode}' transition",
                        ctx.render.transition_secs
                    )),
                    Some(LoopFallback::ClipTooShort) => ctx.reporter.warning(format!(
                        "Clip is too short for a {}s '{mode}' transition; looping without it",
                        ctx.render.transition_secs
                    )),
                    None => {}
                }
                ctx.reporter.info(format!(
                    "Looping {}x without transition (stream copy) to {}",
                    plan.loop_count,
                    format_duration(target)
                ));
                20
            }
            LoopStrategy::Blended { effect, .. } => {
                ctx.reporter.info(format!(
                    "Looping {}x with '{mode}' transition ({effect}) to {}",
                    plan.loop_count,
                    format_duration(target)
                ));
                10
            }
        };

        let output = ctx.workspace_dir.join(LOOPED_VIDEO_FILE);
        let on_progress =
            ctx.engine_progress(Stage::LoopVideo, "Looping video", milestone_step, Some(target));
        render_loop(
            ctx.engine.as_ref(),
            &ctx.control,
            &plan,
            LoopPaths {
                input: &input,
                workspace_dir: &ctx.workspace_dir,
                output: &output,
            },
            &ctx.render,
            &on_progress,
        )
        .await?;
        ctx.reporter.progress(Stage::LoopVideo, 100.0, "Video looped");
        ctx.reporter.success(format!("Video looped {}x", plan.loop_count));

        state.looped_video = Some(output);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MergeFinal
// ---------------------------------------------------------------------------

/// Mux the looped video with the merged audio into the output folder.
pub struct MergeFinalStage;

#[async_trait]
impl PipelineStage for MergeFinalStage {
    fn stage(&self) -> Stage {
        Stage::MergeFinal
    }

    async fn execute(&self, ctx: &StageContext, state: &mut JobState) -> Result<()> {
        ctx.reporter.progress(Stage::MergeFinal, 0.0, "Merging video and audio");
        let video = state.looped_video()?.to_path_buf();
        let audio = state.merged_audio()?.to_path_buf();
        let audio_duration = state.audio_duration()?;

        let denominator = match ctx.probe_duration(&video).await {
            Ok(v) => Some(v.min(audio_duration)),
            Err(e) if e.is_aborted() => return Err(e),
            Err(e) => {
                ctx.reporter.warning(format!(
                    "Could not read looped video duration: {e}; final progress unavailable"
                ));
                None
            }
        };

        let name = final_output_name(&ctx.render.product_tag, Utc::now());
        let output = ctx.options.output_folder.join(name);
        let on_progress = ctx.engine_progress(Stage::MergeFinal, "Final merge", 10, denominator);
        mux_final(
            ctx.engine.as_ref(),
            &ctx.control,
            &video,
            &audio,
            &output,
            &ctx.render,
            &on_progress,
        )
        .await?;
        ctx.reporter.progress(Stage::MergeFinal, 100.0, "Done");
        ctx.reporter
            .success(format!("Output written to {}", output.display()));

        state.output_path = Some(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_stages_are_in_pipeline_order() {
        let stages: Vec<Stage> = standard_stages().iter().map(|s| s.stage()).collect();
        assert_eq!(stages, Stage::PIPELINE.to_vec());
    }

    #[test]
    fn names_follow_stage() {
        assert_eq!(LoopVideoStage.name(), "loop-video");
        assert_eq!(MergeFinalStage.name(), "merge-final");
    }
}
