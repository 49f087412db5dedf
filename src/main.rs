//! Gensub - Batch Subtitle Generation
//!
//! This is the main entry point for the gensub command line tool, which
//! turns audio and video files into SRT subtitles using ffmpeg, an
//! energy-based voice activity detector and the Gemini speech API.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use gensub::cli::Args;
use gensub::config::Config;
use gensub::error::GensubError;
use gensub::transcribe::TranscriptMode;
use gensub::workflow::{BatchSummary, JobOptions, Workflow};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try to load config.toml from current directory first
            if std::path::Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    // Apply command line overrides
    if let Some(language) = &args.language {
        config.transcriber.language = language.clone();
    }
    if let Some(segment_duration) = args.segment_duration {
        if segment_duration <= 0.0 {
            return Err(
                GensubError::Config("Segment duration must be positive".to_string()).into(),
            );
        }
        config.vad.max_group_secs = segment_duration;
    }

    let mode = match (&args.translate, args.bilingual) {
        (Some(target), true) => TranscriptMode::Bilingual { target: target.clone() },
        (Some(target), false) => TranscriptMode::Translate { target: target.clone() },
        (None, _) => TranscriptMode::Transcribe,
    };

    let options = JobOptions {
        mode,
        output_dir: args.output_dir.clone(),
        keep_temp: args.keep_temp,
    };

    // Create workflow instance
    let workflow = Workflow::new(config)?;

    if let Some(watch_dir) = &args.watch {
        workflow.watch_folder(watch_dir, &options).await?;
    } else {
        let summary = workflow.run_batch(&args.inputs, &options).await?;
        print_summary(&summary);

        if !summary.all_succeeded() {
            std::process::exit(1);
        }
    }

    info!("Subtitle generation completed successfully");
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let gensub_dir = std::env::current_dir()?.join(".gensub");
    let log_dir = gensub_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "gensub.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Create console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Print the end-of-run batch summary
fn print_summary(summary: &BatchSummary) {
    println!("\nBatch Summary:");
    println!("{:<12} {}", "Total:", summary.total());
    println!("{:<12} {}", "Succeeded:", summary.succeeded.len());
    println!("{:<12} {}", "Failed:", summary.failed.len());

    if !summary.failed.is_empty() {
        println!("\nFailed files:");
        println!("{:<50} {}", "File", "Error");
        println!("{}", "-".repeat(80));
        for (path, error) in &summary.failed {
            println!("{:<50} {}", path.display().to_string(), error);
        }
    }
}
