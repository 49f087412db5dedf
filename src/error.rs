use thiserror::Error;

#[derive(Error, Debug)]
pub enum GensubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WAV decoding error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Transcription error: {0}")]
    Transcribe(String),

    #[error("Voice activity detection error: {0}")]
    Vad(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Subtitle generation error: {0}")]
    Subtitle(String),

    #[error("No speech detected in {0}")]
    NoSpeech(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, GensubError>;
