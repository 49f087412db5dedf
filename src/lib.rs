//! Gensub - Batch Subtitle Generation
//!
//! Turns audio and video files into SRT subtitles by locating speech with
//! an energy-based voice activity detector, cutting the audio into chunks
//! with ffmpeg and transcribing each chunk through the Gemini speech API.

pub mod cli;
pub mod config;
pub mod workflow;
pub mod transcribe;
pub mod subtitle;
pub mod media;
pub mod error;
pub mod vad;
