//! Engine-backed stage actions: audio merge, mute, loop render and final
//! mux, plus the pure builders that shape their engine invocations.

mod final_mux;
mod loop_video;
mod merge_audio;
mod mute;

pub use final_mux::{final_mux_invocation, final_output_name, mux_final};
pub use loop_video::{
    concat_manifest, loop_count, loop_invocation, render_loop, xfade_filter, xfade_offsets,
    LoopFallback, LoopPaths, LoopPlan, LoopStrategy, CONCAT_MANIFEST_FILE, LOOPED_VIDEO_FILE,
};
pub use merge_audio::{audio_concat_filter, merge_audio, merge_audio_invocation, MERGED_AUDIO_FILE};
pub use mute::{mute_invocation, mute_video, MUTED_VIDEO_FILE};
