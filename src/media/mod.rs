// Media processing layer
//
// Everything that shells out to ffmpeg lives here:
// - Processor: the ffmpeg-backed implementation
// - Commands: command builders and execution

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Audio container extensions accepted as input
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "m4a", "aac", "ogg", "wma", "aiff", "opus", "amr", "au", "ra",
];

/// Video container extensions accepted as input
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "m4v", "3gp",
];

/// Coarse classification of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

/// Classify a path by its extension, if it is a supported format.
pub fn media_kind(path: &Path) -> Option<MediaKind> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        Some(MediaKind::Audio)
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Whether the path has a supported audio or video extension.
pub fn is_supported_format(path: &Path) -> bool {
    media_kind(path).is_some()
}

/// Main trait for media processing operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Decode any supported input into mono PCM WAV for analysis
    async fn decode_to_wav(&self, input_path: &Path, wav_path: &Path) -> Result<()>;

    /// Cut one span out of the decoded WAV and encode it for upload
    async fn export_chunk(
        &self,
        wav_path: &Path,
        chunk_path: &Path,
        start_secs: f64,
        duration_secs: f64,
    ) -> Result<()>;

    /// Check if the media processor is available
    fn check_availability(&self) -> Result<()>;

    /// Get media processor version information
    async fn get_version_info(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (ffmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_media_kind_classification() {
        assert_eq!(media_kind(&PathBuf::from("talk.mp3")), Some(MediaKind::Audio));
        assert_eq!(media_kind(&PathBuf::from("movie.MKV")), Some(MediaKind::Video));
        assert_eq!(media_kind(&PathBuf::from("notes.txt")), None);
        assert_eq!(media_kind(&PathBuf::from("no_extension")), None);
    }

    #[test]
    fn test_supported_format_covers_both_kinds() {
        assert!(is_supported_format(&PathBuf::from("a.opus")));
        assert!(is_supported_format(&PathBuf::from("b.webm")));
        assert!(!is_supported_format(&PathBuf::from("c.srt")));
    }
}
