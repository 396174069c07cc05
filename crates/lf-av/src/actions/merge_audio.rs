//! Concatenate the selected audio tracks into a single AAC track.

use std::path::Path;

use lf_core::config::RenderConfig;
use lf_core::{MediaFile, Result};

use crate::engine::{EngineInvocation, Transcoder};
use crate::process::RunControl;

/// File name of the merged track inside the workspace.
pub const MERGED_AUDIO_FILE: &str = "merged_audio.m4a";

/// `[0:a][1:a]...concat=n=N:v=0:a=1[outa]`
pub fn audio_concat_filter(inputs: usize) -> String {
    let mut graph: String = (0..inputs).map(|i| format!("[{i}:a]")).collect();
    graph.push_str(&format!("concat=n={inputs}:v=0:a=1[outa]"));
    graph
}

pub fn merge_audio_invocation(
    inputs: &[MediaFile],
    output: &Path,
    render: &RenderConfig,
) -> EngineInvocation {
    inputs
        .iter()
        .fold(EngineInvocation::new("merge-audio", output), |inv, f| {
            inv.input(&f.path)
        })
        .filter_complex(audio_concat_filter(inputs.len()))
        .map("[outa]")
        .output_options([
            "-c:a",
            render.audio_codec.as_str(),
            "-b:a",
            render.audio_bitrate.as_str(),
            "-f",
            "mp4",
        ])
        .timeout(Some(render.merge_timeout()))
}

/// Run the merge. `on_progress` receives elapsed output seconds.
pub async fn merge_audio(
    engine: &dyn Transcoder,
    control: &RunControl,
    inputs: &[MediaFile],
    output: &Path,
    render: &RenderConfig,
    on_progress: &(dyn Fn(f64) + Send + Sync),
) -> Result<()> {
    tracing::info!(tracks = inputs.len(), output = %output.display(), "merging audio");
    let inv = merge_audio_invocation(inputs, output, render);
    engine.run(&inv, control, on_progress).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn concat_filter_for_three_inputs() {
        assert_eq!(
            audio_concat_filter(3),
            "[0:a][1:a][2:a]concat=n=3:v=0:a=1[outa]"
        );
        assert_eq!(audio_concat_filter(1), "[0:a]concat=n=1:v=0:a=1[outa]");
    }

    #[test]
    fn invocation_shape() {
        let files = vec![
            MediaFile::from_path("/music/a.mp3"),
            MediaFile::from_path("/music/b.wav"),
        ];
        let render = RenderConfig::default();
        let inv = merge_audio_invocation(&files, Path::new("/w/merged_audio.m4a"), &render);

        assert_eq!(inv.inputs.len(), 2);
        assert_eq!(inv.inputs[1].path, Path::new("/music/b.wav"));
        assert_eq!(inv.maps, vec!["[outa]"]);
        assert_eq!(inv.timeout, Some(Duration::from_secs(1800)));

        let args = inv.to_args();
        assert!(args.windows(2).any(|w| w == ["-b:a", "192k"]));
        assert!(args.windows(2).any(|w| w == ["-f", "mp4"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
    }
}
