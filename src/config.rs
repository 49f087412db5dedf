use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, GensubError};

/// Placeholder value shipped in example configs; treated the same as an
/// unset key.
pub const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY_HERE";

/// Environment variable consulted when the config file carries no API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transcriber: TranscriberConfig,
    #[serde(default)]
    pub vad: VadConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub subtitle: SubtitleConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    /// Base URL of the speech API
    pub endpoint: String,
    /// API key; empty falls back to the GEMINI_API_KEY environment variable
    pub api_key: String,
    /// Model used for transcription
    pub model: String,
    /// Source language hint ("auto" lets the model detect it)
    pub language: String,
    /// Sampling temperature for transcription
    pub temperature: f32,
    /// Response token budget per chunk
    pub max_output_tokens: u32,
    /// Maximum attempts per chunk for transient API failures
    pub max_retries: u32,
    /// Initial backoff between retry attempts, doubled per attempt
    pub retry_backoff_ms: u64,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Samples per analysis frame
    pub frame_width: usize,
    /// Regions shorter than this are discarded (seconds)
    pub min_region_secs: f64,
    /// An open region is force-closed at this length (seconds)
    pub max_region_secs: f64,
    /// Energy percentile used as the silence threshold (0.0 - 1.0)
    pub energy_percentile: f64,
    /// Maximum duration of one grouped chunk (seconds)
    pub max_group_secs: f64,
    /// Maximum silence bridged inside one chunk (seconds)
    pub max_gap_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Sample rate for decoded analysis audio
    pub sample_rate: u32,
    /// Encoding for chunk uploads: Ogg (Opus) keeps payloads small, Wav is lossless
    pub chunk_format: ChunkFormat,
    /// Bitrate for Opus chunk encoding
    pub chunk_bitrate: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkFormat {
    /// Opus in an Ogg container
    Ogg,
    /// PCM WAV
    Wav,
}

impl ChunkFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ChunkFormat::Ogg => "ogg",
            ChunkFormat::Wav => "wav",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ChunkFormat::Ogg => "audio/ogg",
            ChunkFormat::Wav => "audio/wav",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    /// Maximum characters per rendered subtitle line
    pub max_line_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Seconds between directory scans in watch mode
    pub poll_secs: u64,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            language: "auto".to_string(),
            temperature: 0.0,
            max_output_tokens: 8192,
            max_retries: 3,
            retry_backoff_ms: 500,
            timeout_secs: 300,
        }
    }
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            frame_width: 4096,
            min_region_secs: 0.5,
            max_region_secs: 6.0,
            energy_percentile: 0.2,
            max_group_secs: 30.0,
            max_gap_secs: 2.0,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            sample_rate: 16000,
            chunk_format: ChunkFormat::Ogg,
            chunk_bitrate: "32k".to_string(),
        }
    }
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            max_line_chars: 40,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_secs: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcriber: TranscriberConfig::default(),
            vad: VadConfig::default(),
            media: MediaConfig::default(),
            subtitle: SubtitleConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl TranscriberConfig {
    /// Resolve the effective API key from the config file or the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        let from_file = self.api_key.trim();
        if !from_file.is_empty() && from_file != API_KEY_PLACEHOLDER {
            return Some(from_file.to_string());
        }

        match std::env::var(API_KEY_ENV) {
            Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
            _ => None,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GensubError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| GensubError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GensubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| GensubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_usable() {
        let config = Config::default();
        assert_eq!(config.transcriber.model, "gemini-2.0-flash");
        assert_eq!(config.vad.frame_width, 4096);
        assert_eq!(config.media.chunk_format, ChunkFormat::Ogg);
        assert_eq!(config.subtitle.max_line_chars, 40);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [transcriber]
            api_key = "abc123"
            language = "ja"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.transcriber.api_key, "abc123");
        assert_eq!(parsed.transcriber.language, "ja");
        assert_eq!(parsed.transcriber.model, "gemini-2.0-flash");
        assert_eq!(parsed.vad.max_group_secs, 30.0);
        assert_eq!(parsed.watch.poll_secs, 5);
    }

    #[test]
    fn test_placeholder_key_is_not_resolved() {
        let mut transcriber = TranscriberConfig::default();
        transcriber.api_key = API_KEY_PLACEHOLDER.to_string();
        // Only meaningful when the environment variable is unset; guard for
        // developer machines that export a real key.
        if std::env::var(API_KEY_ENV).is_err() {
            assert!(transcriber.resolved_api_key().is_none());
        }

        transcriber.api_key = "real-key".to_string();
        assert_eq!(transcriber.resolved_api_key().as_deref(), Some("real-key"));
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.transcriber.api_key = "file-key".to_string();
        config.vad.max_group_secs = 20.0;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.transcriber.api_key, "file-key");
        assert_eq!(loaded.vad.max_group_secs, 20.0);
    }
}
