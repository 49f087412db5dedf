use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{GensubError, Result};
use crate::media::{is_supported_format, MediaProcessorFactory, MediaProcessorTrait};
use crate::subtitle::{cues_from_segments, write_srt};
use crate::transcribe::{
    AudioChunk, ChunkRequest, SpeechSegment, TranscriberFactory, TranscriberTrait, TranscriptMode,
};
use crate::vad::{self, ChunkSpan, VoiceActivityDetector};

/// Per-run options resolved from the command line.
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub mode: TranscriptMode,
    /// Target directory for SRT files; None places them next to the input
    pub output_dir: Option<PathBuf>,
    /// Leave decoded audio and chunk files on disk for inspection
    pub keep_temp: bool,
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Workflow {
    config: Config,
    media: Box<dyn MediaProcessorTrait>,
    transcriber: Box<dyn TranscriberTrait>,
    vad: VoiceActivityDetector,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        let media = MediaProcessorFactory::create_processor(config.media.clone());
        let transcriber = TranscriberFactory::create_default(config.transcriber.clone());

        // Check dependencies
        media.check_availability()?;
        transcriber.check_availability()?;

        let vad = VoiceActivityDetector::new(config.vad.clone());

        Ok(Self {
            config,
            media,
            transcriber,
            vad,
        })
    }

    /// Run the full pipeline for one media file and return the SRT path.
    pub async fn process_file(&self, input_path: &Path, options: &JobOptions) -> Result<PathBuf> {
        if !input_path.exists() {
            return Err(GensubError::FileNotFound(input_path.display().to_string()));
        }
        if !is_supported_format(input_path) {
            return Err(GensubError::UnsupportedFormat(input_path.display().to_string()));
        }

        info!("Processing {}", input_path.display());

        // Step 1: decode to mono analysis audio in a scratch directory
        let scratch = tempfile::tempdir()?;
        let work_dir = if options.keep_temp {
            let path = scratch.into_path();
            info!("Keeping temporary audio under {}", path.display());
            path
        } else {
            scratch.path().to_path_buf()
        };

        let wav_path = work_dir.join("audio.wav");
        self.media.decode_to_wav(input_path, &wav_path).await?;

        let total_duration = vad::wav_duration(&wav_path)?;
        debug!("Decoded {:.1} seconds of audio", total_duration);

        // Step 2: locate speech and group it into chunks
        let spans = match self.vad.find_speech_regions(&wav_path) {
            Ok(regions) => {
                if regions.is_empty() {
                    return Err(GensubError::NoSpeech(input_path.display().to_string()));
                }
                debug!("Voice activity detection found {} speech regions", regions.len());
                self.vad.group_regions(&regions)
            }
            Err(e) => {
                warn!(
                    "Voice activity detection failed ({}), falling back to fixed-length chunks",
                    e
                );
                self.vad.fixed_spans(total_duration)
            }
        };
        if spans.is_empty() {
            return Err(GensubError::NoSpeech(input_path.display().to_string()));
        }
        info!("Split into {} chunks", spans.len());

        // Step 3: export and transcribe each chunk
        let segments = self.transcribe_spans(&spans, &wav_path, &work_dir, options).await?;

        // Step 4: assemble and write subtitles
        let cues = cues_from_segments(
            segments,
            options.mode.is_bilingual(),
            self.config.subtitle.max_line_chars,
        );
        if cues.is_empty() {
            return Err(GensubError::Subtitle(format!(
                "No subtitle cues produced for {}",
                input_path.display()
            )));
        }

        let output_path = self.output_path_for(input_path, options)?;
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        write_srt(&cues, &output_path).await?;

        Ok(output_path)
    }

    async fn transcribe_spans(
        &self,
        spans: &[ChunkSpan],
        wav_path: &Path,
        work_dir: &Path,
        options: &JobOptions,
    ) -> Result<Vec<SpeechSegment>> {
        let format = self.config.media.chunk_format;

        let pb = ProgressBar::new(spans.len() as u64);
        pb.set_style(ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks")
            .unwrap()
            .progress_chars("#>-"));

        let mut segments = Vec::new();
        for (i, span) in spans.iter().enumerate() {
            let chunk_path = work_dir.join(format!("chunk_{:04}.{}", i, format.extension()));
            self.media
                .export_chunk(wav_path, &chunk_path, span.start, span.duration())
                .await?;
            let audio = fs::read(&chunk_path).await?;

            let chunk = AudioChunk {
                index: i,
                start_ms: (span.start * 1000.0).round() as u64,
                end_ms: (span.end * 1000.0).round() as u64,
                audio,
                mime_type: format.mime_type().to_string(),
            };
            let request = ChunkRequest {
                mode: options.mode.clone(),
                language: self.config.transcriber.language.clone(),
                label: format!("chunk {}/{}", i + 1, spans.len()),
            };

            let chunk_segments = self.transcriber.transcribe_chunk(&chunk, &request).await?;
            debug!("[{}] {} segments", request.label, chunk_segments.len());

            segments.extend(
                chunk_segments
                    .into_iter()
                    .map(|segment| segment.with_offset(span.start)),
            );
            pb.inc(1);
        }
        pb.finish_and_clear();

        Ok(segments)
    }

    fn output_path_for(&self, input_path: &Path, options: &JobOptions) -> Result<PathBuf> {
        let file_stem = input_path.file_stem().ok_or_else(|| {
            GensubError::Config(format!("Invalid file name: {}", input_path.display()))
        })?;

        let mut file_name = file_stem.to_os_string();
        file_name.push(".srt");

        match &options.output_dir {
            Some(dir) => Ok(dir.join(file_name)),
            None => Ok(input_path.with_file_name(file_name)),
        }
    }

    /// Process every input sequentially, continuing past per-file failures.
    pub async fn run_batch(&self, inputs: &[PathBuf], options: &JobOptions) -> Result<BatchSummary> {
        let files = expand_inputs(inputs);
        if files.is_empty() {
            return Err(GensubError::Config("No media files to process".to_string()));
        }

        if let Ok(version) = self.media.get_version_info().await {
            debug!("Using {}", version);
        }
        info!("Processing {} files ({})", files.len(), options.mode.describe());

        let mut summary = BatchSummary::default();
        for path in files {
            match self.process_file(&path, options).await {
                Ok(output_path) => {
                    info!(
                        "Successfully processed {} -> {}",
                        path.display(),
                        output_path.display()
                    );
                    summary.succeeded.push(path);
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", path.display(), e);
                    summary.failed.push((path, e.to_string()));
                }
            }
        }

        Ok(summary)
    }

    /// Poll a directory for media files and process each one once.
    pub async fn watch_folder(&self, folder: &Path, options: &JobOptions) -> Result<()> {
        if !folder.is_dir() {
            return Err(GensubError::Config(format!(
                "Watch target is not a directory: {}",
                folder.display()
            )));
        }

        info!("Watching {} for media files, Ctrl-C to stop", folder.display());

        let poll = Duration::from_secs(self.config.watch.poll_secs.max(1));
        let mut seen: HashSet<PathBuf> = HashSet::new();

        loop {
            self.watch_pass(folder, &mut seen, options).await;

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Stopping watch mode");
                    return Ok(());
                }
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }

    /// One polling pass: process every media file in the folder that has not
    /// been seen yet. Failures are logged and the pass continues.
    async fn watch_pass(
        &self,
        folder: &Path,
        seen: &mut HashSet<PathBuf>,
        options: &JobOptions,
    ) {
        for path in expand_inputs(&[folder.to_path_buf()]) {
            if !seen.insert(path.clone()) {
                continue;
            }
            match self.process_file(&path, options).await {
                Ok(output_path) => info!(
                    "Successfully processed {} -> {}",
                    path.display(),
                    output_path.display()
                ),
                Err(e) => warn!("Failed to process {}: {}", path.display(), e),
            }
        }
    }
}

/// Expand files and directories into a flat list of media files.
///
/// Directories are scanned one level deep and their matches sorted for a
/// stable processing order. Non-directory inputs pass through untouched so
/// missing files are reported per file later.
pub fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_file() && is_supported_format(entry.path()))
                .map(|entry| entry.path().to_path_buf())
                .collect();
            found.sort();
            info!("Found {} media files in {}", found.len(), input.display());
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }

    files
}
