//! Strip the audio stream from the source clip.

use std::path::Path;

use lf_core::Result;

use crate::engine::{EngineInvocation, Transcoder};
use crate::process::RunControl;

pub const MUTED_VIDEO_FILE: &str = "muted_video.mp4";

pub fn mute_invocation(input: &Path, output: &Path) -> EngineInvocation {
    EngineInvocation::new("mute-video", output)
        .input(input)
        .output_options(["-an", "-c:v", "copy"])
}

/// Copy the video stream of `input` into `output` without audio.
pub async fn mute_video(
    engine: &dyn Transcoder,
    control: &RunControl,
    input: &Path,
    output: &Path,
) -> Result<()> {
    tracing::info!(input = %input.display(), "removing audio from source video");
    engine.run(&mute_invocation(input, output), control, &|_: f64| {}).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_copy_without_audio() {
        let inv = mute_invocation(Path::new("/v/clip.mp4"), Path::new("/w/muted_video.mp4"));
        assert_eq!(inv.output_options, vec!["-an", "-c:v", "copy"]);
        assert!(inv.filter_complex.is_none());
        assert_eq!(inv.inputs.len(), 1);
    }
}
