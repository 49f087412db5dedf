use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Media files or directories to process
    #[arg(required_unless_present = "watch")]
    pub inputs: Vec<PathBuf>,

    /// Directory for generated subtitle files (default: next to each input)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Translate speech into the given language code (e.g. "en", "ja")
    #[arg(short, long)]
    pub translate: Option<String>,

    /// Keep both the original and the translated text in each cue
    #[arg(short, long, requires = "translate")]
    pub bilingual: bool,

    /// Source language hint (default: auto-detect)
    #[arg(short, long)]
    pub language: Option<String>,

    /// Maximum chunk duration in seconds per API request
    #[arg(short, long)]
    pub segment_duration: Option<f64>,

    /// Watch a directory and process new files as they appear
    #[arg(short, long, conflicts_with = "inputs")]
    pub watch: Option<PathBuf>,

    /// Keep temporary audio files for inspection
    #[arg(long)]
    pub keep_temp: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
