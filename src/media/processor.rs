use async_trait::async_trait;
use std::path::Path;
use std::process::Command;
use tracing::{info, debug};

use crate::config::MediaConfig;
use crate::error::{Result, GensubError};
use super::{MediaProcessorTrait, MediaCommandBuilder};

/// Concrete implementation of the media processor (ffmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    /// Decode any supported input into mono PCM WAV for analysis
    async fn decode_to_wav(&self, input_path: &Path, wav_path: &Path) -> Result<()> {
        info!("Decoding {} to analysis audio", input_path.display());

        let command = self.command_builder.decode_audio(
            input_path,
            wav_path,
            self.config.sample_rate,
        );
        command.execute().await?;

        debug!("Decoded audio written to {}", wav_path.display());
        Ok(())
    }

    /// Cut one span out of the decoded WAV and encode it for upload
    async fn export_chunk(
        &self,
        wav_path: &Path,
        chunk_path: &Path,
        start_secs: f64,
        duration_secs: f64,
    ) -> Result<()> {
        debug!(
            "Exporting chunk {:.3}s + {:.3}s to {}",
            start_secs,
            duration_secs,
            chunk_path.display()
        );

        let command = self.command_builder.cut_chunk(
            wav_path,
            chunk_path,
            start_secs,
            duration_secs,
            self.config.chunk_format,
            &self.config.chunk_bitrate,
        );
        command.execute().await
    }

    /// Check if the media processor is available
    fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.config.binary_path)
            .arg("-version")
            .output()
            .map_err(|e| GensubError::Media(format!("Media processor not found: {}", e)))?;

        if output.status.success() {
            info!("Media processor is available");
            Ok(())
        } else {
            Err(GensubError::Media("Media processor version check failed".to_string()))
        }
    }

    /// Get media processor version information
    async fn get_version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let output = Command::new(&self.config.binary_path)
            .arg("-version")
            .output()
            .map_err(|e| GensubError::Media(format!("Failed to execute media processor: {}", e)))?;

        if output.status.success() {
            let version_info = String::from_utf8_lossy(&output.stdout);
            // First line carries the version
            let first_line = version_info.lines().next().unwrap_or("Unknown version");
            Ok(first_line.to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(GensubError::Media(format!("Media processor version check failed: {}", stderr)))
        }
    }
}
