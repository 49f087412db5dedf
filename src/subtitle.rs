use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::error::Result;
use crate::transcribe::SpeechSegment;

/// One rendered subtitle cue with file-relative times in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub lines: Vec<String>,
}

/// Assemble finished cues from transcribed segments.
///
/// Segments are sorted by start time, entries with empty text or an empty
/// time range are dropped, and the survivors are numbered contiguously from
/// 1. In bilingual mode each cue gets exactly two lines, the greyed original
/// above the translation; otherwise the text is wrapped to `max_line_chars`.
pub fn cues_from_segments(
    segments: Vec<SpeechSegment>,
    bilingual: bool,
    max_line_chars: usize,
) -> Vec<SubtitleCue> {
    let mut segments = segments;
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut cues = Vec::new();
    for segment in segments {
        let text = segment.text.trim();
        if text.is_empty() {
            continue;
        }

        let start_ms = secs_to_ms(segment.start);
        let end_ms = secs_to_ms(segment.end);
        if end_ms <= start_ms {
            continue;
        }

        let lines = if bilingual {
            let translation = match segment.translation.as_deref() {
                Some(value) if !value.trim().is_empty() => value.trim().to_string(),
                _ => {
                    warn!("Dropping bilingual segment without translation: {}", text);
                    continue;
                }
            };
            vec![
                format!("<font color=\"#808080\">{}</font>", text),
                translation,
            ]
        } else {
            wrap_text(text, max_line_chars)
        };

        cues.push(SubtitleCue {
            index: cues.len() + 1,
            start_ms,
            end_ms,
            lines,
        });
    }

    cues
}

/// Render cues into SRT file content.
pub fn render_srt(cues: &[SubtitleCue]) -> String {
    let mut srt_content = String::new();

    for cue in cues {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_srt_time(cue.start_ms),
            format_srt_time(cue.end_ms),
            cue.lines.join("\n")
        ));
    }

    srt_content
}

/// Generate SRT subtitle file from assembled cues
pub async fn write_srt<P: AsRef<Path>>(cues: &[SubtitleCue], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating SRT file: {}", output_path.display());

    fs::write(output_path, render_srt(cues)).await?;

    info!("SRT file generated with {} cues", cues.len());
    Ok(())
}

/// Wrap text to the given line length without splitting words.
///
/// Explicit newlines are preserved. A word longer than the limit gets its
/// own line rather than being split. A limit of 0 disables wrapping.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for source_line in text.lines() {
        let mut current = String::new();
        for word in source_line.split_whitespace() {
            if current.is_empty() {
                current = word.to_string();
            } else if current.len() + 1 + word.len() <= max_chars {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(current);
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn secs_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

/// Format time in milliseconds to SRT time format (HH:MM:SS,mmm)
fn format_srt_time(total_milliseconds: u64) -> String {
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}
