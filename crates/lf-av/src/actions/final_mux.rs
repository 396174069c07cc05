//! Combine the looped video with the merged audio.

use std::path::Path;

use chrono::{DateTime, Utc};
use lf_core::config::RenderConfig;
use lf_core::Result;

use crate::engine::{EngineInvocation, Transcoder};
use crate::process::RunControl;

/// `output_<tag>_<YYYY-MM-DDTHH-MM-SS>.mp4`
pub fn final_output_name(product_tag: &str, at: DateTime<Utc>) -> String {
    format!("output_{product_tag}_{}.mp4", at.format("%Y-%m-%dT%H-%M-%S"))
}

pub fn final_mux_invocation(
    video: &Path,
    audio: &Path,
    output: &Path,
    render: &RenderConfig,
) -> EngineInvocation {
    EngineInvocation::new("merge-final", output)
        .input(video)
        .input(audio)
        .map("0:v:0")
        .map("1:a:0")
        .output_options([
            "-c:v",
            "copy",
            "-c:a",
            render.audio_codec.as_str(),
            "-b:a",
            render.audio_bitrate.as_str(),
            "-shortest",
        ])
        .timeout(render.final_timeout())
}

/// Mux `video` and `audio` into `output`, truncated to the shorter stream.
///
/// A partially written `output` is deleted if the run does not succeed.
pub async fn mux_final(
    engine: &dyn Transcoder,
    control: &RunControl,
    video: &Path,
    audio: &Path,
    output: &Path,
    render: &RenderConfig,
    on_progress: &(dyn Fn(f64) + Send + Sync),
) -> Result<()> {
    tracing::info!(output = %output.display(), "muxing final output");
    let inv = final_mux_invocation(video, audio, output, render);
    let result = engine.run(&inv, control, on_progress).await;

    if result.is_err() {
        match tokio::fs::remove_file(output).await {
            Ok(()) => tracing::info!(path = %output.display(), "removed partial output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %output.display(), "failed to remove partial output: {e}"),
        }
    }
    result
}
