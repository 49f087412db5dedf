use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{GensubError, Result};

/// One transcribed segment with chunk-relative times in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub translation: Option<String>,
}

impl SpeechSegment {
    /// Shift times onto the file timeline.
    pub fn with_offset(mut self, offset_secs: f64) -> Self {
        self.start += offset_secs;
        self.end += offset_secs;
        self
    }
}

/// Parse and validate a provider response into segments.
///
/// The payload should be a JSON array of `{start, end, text[, translation]}`
/// objects, but models wrap it in code fences or prose often enough that the
/// parse falls back to stripping fences and extracting the outermost array.
/// Entries failing validation are skipped rather than failing the chunk;
/// `end` is clamped to the chunk duration. In bilingual mode an entry without
/// a translation is skipped so every surviving segment carries both lines.
pub fn parse_segments(
    payload: &str,
    bilingual: bool,
    chunk_duration_secs: f64,
    label: &str,
) -> Result<Vec<SpeechSegment>> {
    let raw = parse_json_array(payload)?;

    let mut segments = Vec::new();
    for (i, entry) in raw.iter().enumerate() {
        let start = match entry.get("start").and_then(Value::as_f64) {
            Some(value) => value,
            None => {
                warn!("[{}] Skipping segment {}: missing or invalid 'start'", label, i);
                continue;
            }
        };
        let end = match entry.get("end").and_then(Value::as_f64) {
            Some(value) => value,
            None => {
                warn!("[{}] Skipping segment {}: missing or invalid 'end'", label, i);
                continue;
            }
        };
        let text = match entry.get("text").and_then(Value::as_str) {
            Some(value) => value.trim().to_string(),
            None => {
                warn!("[{}] Skipping segment {}: missing or invalid 'text'", label, i);
                continue;
            }
        };

        let translation = if bilingual {
            match entry.get("translation").and_then(Value::as_str) {
                Some(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
                _ => {
                    warn!("[{}] Skipping segment {}: missing translation", label, i);
                    continue;
                }
            }
        } else {
            None
        };

        let end = if chunk_duration_secs > 0.0 {
            end.min(chunk_duration_secs)
        } else {
            end
        };

        if start < 0.0 || end <= start {
            warn!(
                "[{}] Skipping segment {}: bad time range {:.3} - {:.3}",
                label, i, start, end
            );
            continue;
        }

        segments.push(SpeechSegment { start, end, text, translation });
    }

    Ok(segments)
}

/// Parse the payload into a JSON array, tolerating the usual wrappers.
fn parse_json_array(payload: &str) -> Result<Vec<Value>> {
    let text = payload.trim();

    if let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(text) {
        return Ok(entries);
    }

    let cleaned = remove_markdown_code_blocks(text);
    if cleaned != text {
        debug!("Removed markdown code blocks from response");
        if let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(&cleaned) {
            return Ok(entries);
        }
    }

    if let Some(extracted) = extract_json_array(&cleaned) {
        debug!("Extracted JSON array from mixed response text");
        if let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(extracted) {
            return Ok(entries);
        }
    }

    let snippet: String = text.chars().take(200).collect();
    Err(GensubError::Transcribe(format!(
        "Could not parse JSON response: {}",
        snippet
    )))
}

/// Remove markdown code blocks from text
pub fn remove_markdown_code_blocks(text: &str) -> String {
    let text = text.trim();

    // Handle ```json ... ``` pattern
    if text.starts_with("```json") && text.ends_with("```") && text.len() > 10 {
        let inner = &text[7..text.len() - 3];
        return inner.trim().to_string();
    }

    // Handle ``` ... ``` pattern
    if text.starts_with("```") && text.ends_with("```") && text.len() > 6 {
        let inner = &text[3..text.len() - 3];
        return inner.trim().to_string();
    }

    text.to_string()
}

/// Find the outermost JSON array in mixed text.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if start < end {
        Some(&text[start..=end])
    } else {
        None
    }
}

/// Convert language code to full language name for clearer prompts
pub fn language_code_to_name(code: &str) -> String {
    match code.to_lowercase().as_str() {
        "en" => "English".to_string(),
        "id" => "Indonesian".to_string(),
        "ja" => "Japanese".to_string(),
        "ko" => "Korean".to_string(),
        "zh" => "Chinese".to_string(),
        "ar" => "Arabic".to_string(),
        "es" => "Spanish".to_string(),
        "fr" => "French".to_string(),
        "de" => "German".to_string(),
        "it" => "Italian".to_string(),
        "pt" => "Portuguese".to_string(),
        "ru" => "Russian".to_string(),
        "hi" => "Hindi".to_string(),
        "th" => "Thai".to_string(),
        "vi" => "Vietnamese".to_string(),
        "ms" => "Malay".to_string(),
        "nl" => "Dutch".to_string(),
        "pl" => "Polish".to_string(),
        "sv" => "Swedish".to_string(),
        "tr" => "Turkish".to_string(),
        "da" => "Danish".to_string(),
        "no" => "Norwegian".to_string(),
        "fi" => "Finnish".to_string(),
        "uk" => "Ukrainian".to_string(),
        "cs" => "Czech".to_string(),
        "el" => "Greek".to_string(),
        "he" => "Hebrew".to_string(),
        "hu" => "Hungarian".to_string(),
        "ro" => "Romanian".to_string(),
        _ => code.to_string(),
    }
}
