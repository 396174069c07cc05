use clap::{Parser, Subcommand};
use lf_core::TransitionMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "loopforge")]
#[command(author, version, about = "Loop a video clip to the length of an audio playlist")]
pub struct Cli {
    /// Path to config file (TOML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a looped video from a source folder
    Run {
        /// Folder containing the source video and audio files
        #[arg(required = true)]
        source: PathBuf,

        /// Folder the final video is written to
        #[arg(required = true)]
        output: PathBuf,

        /// Source video, by file name in the source folder or by path
        /// (defaults to the first video by name)
        #[arg(long)]
        video: Option<String>,

        /// Number of audio files to use (defaults to all)
        #[arg(short = 'n', long)]
        audio_count: Option<usize>,

        /// Pick audio files in random order
        #[arg(long)]
        random: bool,

        /// Transition between loop iterations
        /// (none, fade, fadeblack, slideLeft, slideRight, blurFade, zoom)
        #[arg(short, long, default_value = "none")]
        transition: TransitionMode,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the videos and audio files in a folder
    Scan {
        /// Folder to scan
        #[arg(required = true)]
        folder: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the duration of a media file
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
