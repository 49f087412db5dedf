use std::path::Path;
use tracing::debug;

use crate::config::ChunkFormat;
use crate::error::{Result, GensubError};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Seek to a position before decoding (seconds)
    pub fn seek(self, start_secs: f64) -> Self {
        self.arg("-ss").arg(format!("{:.3}", start_secs))
    }

    /// Limit the decoded duration (seconds)
    pub fn duration(self, duration_secs: f64) -> Self {
        self.arg("-t").arg(format!("{:.3}", duration_secs))
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Set audio bitrate
    pub fn audio_bitrate<S: Into<String>>(self, bitrate: S) -> Self {
        self.arg("-b:a").arg(bitrate)
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio channels
    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    /// Execute the command
    pub async fn execute(&self) -> Result<()> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = tokio::process::Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| GensubError::Media(format!("Failed to execute media processor: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GensubError::Media(format!(
                "{} failed: {}",
                self.description,
                stderr
            )));
        }

        Ok(())
    }
}

/// Builder for the media operations the pipeline needs
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Build the command that normalizes any input into analysis audio:
    /// mono PCM WAV at the configured sample rate
    pub fn decode_audio<P: AsRef<Path>>(
        &self,
        input_path: P,
        wav_path: P,
        sample_rate: u32,
    ) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio decoding")
            .input(input_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(sample_rate)
            .audio_channels(1)
            .overwrite()
            .output(wav_path)
    }

    /// Build the command that cuts one chunk span out of the decoded WAV
    /// and encodes it for upload
    pub fn cut_chunk<P: AsRef<Path>>(
        &self,
        wav_path: P,
        chunk_path: P,
        start_secs: f64,
        duration_secs: f64,
        format: ChunkFormat,
        bitrate: &str,
    ) -> MediaCommand {
        let cmd = MediaCommand::new(
            &self.binary_path,
            format!("Chunk export ({:.3}s + {:.3}s)", start_secs, duration_secs),
        )
        .input(wav_path)
        .seek(start_secs)
        .duration(duration_secs);

        let cmd = match format {
            ChunkFormat::Ogg => cmd.audio_codec("libopus").audio_bitrate(bitrate.to_string()),
            ChunkFormat::Wav => cmd.audio_codec("pcm_s16le"),
        };

        cmd.overwrite().output(chunk_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check")
            .arg("-version")
    }

    /// Build custom command
    pub fn custom<S: Into<String>>(&self, description: S) -> MediaCommand {
        MediaCommand::new(&self.binary_path, description.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_audio_arguments() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let cmd = builder.decode_audio("in.mkv", "out.wav", 16000);

        assert_eq!(cmd.binary_path, "ffmpeg");
        assert_eq!(
            cmd.args,
            vec![
                "-i", "in.mkv", "-vn", "-c:a", "pcm_s16le", "-ar", "16000", "-ac", "1", "-y",
                "out.wav",
            ]
        );
    }

    #[test]
    fn test_cut_chunk_encodes_opus() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let cmd = builder.cut_chunk("audio.wav", "chunk.ogg", 12.5, 30.0, ChunkFormat::Ogg, "32k");

        assert!(cmd.args.windows(2).any(|w| w == ["-ss", "12.500"]));
        assert!(cmd.args.windows(2).any(|w| w == ["-t", "30.000"]));
        assert!(cmd.args.windows(2).any(|w| w == ["-c:a", "libopus"]));
        assert!(cmd.args.windows(2).any(|w| w == ["-b:a", "32k"]));
        assert_eq!(cmd.args.last().map(String::as_str), Some("chunk.ogg"));
    }

    #[test]
    fn test_cut_chunk_wav_has_no_bitrate() {
        let builder = MediaCommandBuilder::new("ffmpeg");
        let cmd = builder.cut_chunk("audio.wav", "chunk.wav", 0.0, 5.0, ChunkFormat::Wav, "32k");

        assert!(cmd.args.windows(2).any(|w| w == ["-c:a", "pcm_s16le"]));
        assert!(!cmd.args.iter().any(|a| a == "-b:a"));
    }
}
