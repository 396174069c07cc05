mod cli;

use lf_av::{scan_folder, DurationProbe, FfprobeProber, ToolRegistry};
use lf_core::config::Config;
use lf_core::events::{EventBus, JobEvent};
use lf_core::{format_duration, MediaFile, ProcessingOptions, ProcessingResult, TransitionMode};
use lf_pipeline::JobController;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "loopforge=debug,lf_pipeline=debug,lf_av=debug,lf_core=debug".to_string()
        } else {
            "warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            source,
            output,
            video,
            audio_count,
            random,
            transition,
            json,
        } => {
            let request = RunRequest {
                source,
                output,
                video,
                audio_count,
                random,
                transition,
                json,
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_job(request, cli.config.as_deref()))
        }
        Commands::Scan { folder, json } => scan(&folder, cli.config.as_deref(), json),
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, cli.config.as_deref(), json))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("loopforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

struct RunRequest {
    source: PathBuf,
    output: PathBuf,
    video: Option<String>,
    audio_count: Option<usize>,
    random: bool,
    transition: TransitionMode,
    json: bool,
}

/// Resolve `--video` against the scanned videos, or fall back to the first
/// one by name.
fn pick_video(videos: &[MediaFile], wanted: Option<&str>) -> Result<MediaFile> {
    match wanted {
        Some(w) => {
            if let Some(found) = videos.iter().find(|v| v.name == w) {
                return Ok(found.clone());
            }
            let path = Path::new(w);
            if path.is_file() {
                return Ok(MediaFile::from_path(path));
            }
            anyhow::bail!("Video not found: {w}")
        }
        None => videos
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No video files found in the source folder")),
    }
}

async fn run_job(req: RunRequest, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);
    for warning in config.validate() {
        tracing::warn!("config: {warning}");
    }

    let found = scan_folder(&req.source, &config.scan)?;
    let video = pick_video(&found.videos, req.video.as_deref())?;
    if found.audios.is_empty() {
        anyhow::bail!("No audio files found in {}", req.source.display());
    }

    let options = ProcessingOptions {
        source_folder: req.source.clone(),
        output_folder: req.output.clone(),
        selected_video: video,
        audio_count: req.audio_count.unwrap_or(found.audios.len()),
        audio_files: found.audios,
        randomize_audio: req.random,
        transition_mode: req.transition,
    };

    let tools = ToolRegistry::discover(&config.tools);
    let bus = Arc::new(EventBus::default());
    let controller = JobController::from_tools(&config, &tools, bus.clone())?;

    let printer = tokio::spawn(print_events(bus.subscribe()));
    drop(bus);

    let result = {
        let submit = controller.submit(options);
        tokio::pin!(submit);
        let mut aborting = false;
        loop {
            tokio::select! {
                result = &mut submit => break result,
                _ = tokio::signal::ctrl_c(), if !aborting => {
                    aborting = true;
                    eprintln!("\nInterrupted; aborting...");
                    controller.abort();
                }
            }
        }
    };

    // Dropping the controller closes the event stream so the printer drains.
    drop(controller);
    let _ = printer.await;

    match result {
        Ok(done) => {
            if req.json {
                println!("{}", serde_json::to_string_pretty(&done)?);
            } else {
                print_summary(&done);
            }
            Ok(())
        }
        Err(e) => {
            if req.json {
                let body = serde_json::json!({
                    "success": false,
                    "kind": e.kind(),
                    "error": e.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            Err(e.into())
        }
    }
}

async fn print_events(mut rx: tokio::sync::broadcast::Receiver<lf_core::events::Event>) {
    loop {
        match rx.recv().await {
            Ok(event) => match event.payload {
                JobEvent::Log { level, message } => eprintln!("[{level}] {message}"),
                JobEvent::Progress { percent, label } => eprintln!("[{percent:>3}%] {label}"),
                _ => {}
            },
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_summary(result: &ProcessingResult) {
    let stats = &result.stats;
    println!("\nProcessing complete!");
    println!("Output: {}", result.output_path.display());
    println!("  Audio files:    {}", stats.audio_count);
    println!(
        "  Audio duration: {}",
        format_duration(stats.total_audio_duration)
    );
    println!(
        "  Source video:   {}",
        format_duration(stats.original_video_duration)
    );
    println!(
        "  Final video:    {}",
        format_duration(stats.final_video_duration)
    );
    println!("  Loops:          {}", stats.loop_count);
}

fn scan(folder: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let found = scan_folder(folder, &config.scan)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }

    println!("Videos: {}", found.videos.len());
    for v in &found.videos {
        println!("  {}", v.name);
    }
    println!("\nAudio files: {}", found.audios.len());
    for a in &found.audios {
        println!("  {}", a.name);
    }
    Ok(())
}

async fn probe_file(file: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::new(tools.require("ffprobe")?.to_path_buf());
    let duration = prober.duration(file).await?;

    if json {
        let body = serde_json::json!({
            "file": file,
            "duration": duration,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("File: {}", file.display());
        println!("Duration: {} ({duration:.2}s)", format_duration(duration));
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg and ffprobe to render videos.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let render = &config.render;
    println!(
        "  Audio: {} @ {}",
        render.audio_codec, render.audio_bitrate
    );
    println!(
        "  Video: {} preset {} crf {}",
        render.video_codec, render.video_preset, render.video_crf
    );
    println!("  Transition: {}s", render.transition_secs);
    println!("  Output tag: {}", render.product_tag);

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  ! {w}");
        }
    }

    Ok(())
}
