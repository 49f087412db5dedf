// Transcription layer
//
// Speech-to-text providers are created through a factory so the pipeline
// only sees the trait:
// - Gemini: generative speech API (upload, generate, delete)
//
// To add a new provider:
// 1. Implement TranscriberTrait for the service client
// 2. Add the service to TranscriberImplementation
// 3. Update the factory to create it

pub mod common;
pub mod gemini;

use async_trait::async_trait;

pub use common::*;
use crate::config::TranscriberConfig;
use crate::error::Result;

/// Output mode requested for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptMode {
    /// Original-language transcription
    Transcribe,
    /// Translated text only
    Translate { target: String },
    /// Original and translation per cue
    Bilingual { target: String },
}

impl TranscriptMode {
    pub fn is_bilingual(&self) -> bool {
        matches!(self, TranscriptMode::Bilingual { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            TranscriptMode::Transcribe => "transcribe".to_string(),
            TranscriptMode::Translate { target } => format!("translate to {}", target),
            TranscriptMode::Bilingual { target } => format!("bilingual with {}", target),
        }
    }
}

/// One exported audio chunk ready for upload.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub audio: Vec<u8>,
    pub mime_type: String,
}

impl AudioChunk {
    pub fn duration_secs(&self) -> f64 {
        (self.end_ms.saturating_sub(self.start_ms)) as f64 / 1000.0
    }
}

/// Per-chunk request context passed to the provider.
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    pub mode: TranscriptMode,
    /// Source language hint; "auto" lets the model detect it
    pub language: String,
    /// Display label for logs, e.g. "chunk 3/16"
    pub label: String,
}

/// Main trait for transcription operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriberTrait: Send + Sync {
    /// Transcribe one audio chunk into segments with chunk-relative times
    async fn transcribe_chunk(
        &self,
        chunk: &AudioChunk,
        request: &ChunkRequest,
    ) -> Result<Vec<SpeechSegment>>;

    /// Check the provider is usable (credentials present)
    fn check_availability(&self) -> Result<()>;
}

/// Transcriber implementation type
#[derive(Debug, Clone)]
pub enum TranscriberImplementation {
    Gemini,
    // Future implementations can be added here:
    // OpenAI,
    // AssemblyAI,
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    /// Create a transcriber based on implementation type
    pub fn create_transcriber(
        implementation: TranscriberImplementation,
        config: TranscriberConfig,
    ) -> Box<dyn TranscriberTrait> {
        match implementation {
            TranscriberImplementation::Gemini => {
                Box::new(gemini::GeminiTranscriber::new(config))
            }
        }
    }

    /// Create with the default implementation (Gemini)
    pub fn create_default(config: TranscriberConfig) -> Box<dyn TranscriberTrait> {
        Self::create_transcriber(TranscriberImplementation::Gemini, config)
    }
}
