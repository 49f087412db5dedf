use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::TranscriberConfig;
use crate::error::{GensubError, Result};
use super::common::{language_code_to_name, parse_segments, SpeechSegment};
use super::{AudioChunk, ChunkRequest, TranscriberTrait, TranscriptMode};

/// Delay between uploaded-file status checks
const POLL_INTERVAL_MS: u64 = 1000;
/// Upper bound on status checks before the attempt is abandoned
const MAX_POLL_ATTEMPTS: u32 = 300;

/// Failure of a single API attempt, split by whether a retry makes sense
#[derive(Debug)]
enum AttemptError {
    /// Rate limits, server errors and network hiccups; retried with backoff
    Transient(GensubError),
    /// Bad requests, rejected files and unparseable responses; returned as-is
    Fatal(GensubError),
}

type AttemptResult<T> = std::result::Result<T, AttemptError>;

/// Handle for a file uploaded to the provider for one attempt
struct UploadedFile {
    name: String,
    uri: String,
    state: String,
}

/// Gemini-based transcription via the file upload and generateContent APIs
pub struct GeminiTranscriber {
    config: TranscriberConfig,
    client: reqwest::Client,
}

impl GeminiTranscriber {
    pub fn new(config: TranscriberConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("HTTP client creation should not fail");

        Self { config, client }
    }

    fn api_key(&self) -> Result<String> {
        self.config.resolved_api_key().ok_or_else(|| {
            GensubError::Config(
                "No API key configured. Set transcriber.api_key in the config file or the GEMINI_API_KEY environment variable".to_string(),
            )
        })
    }

    /// Build the instruction prompt for one chunk.
    fn build_prompt(&self, request: &ChunkRequest, chunk_duration_secs: f64) -> String {
        let language_hint = if request.language.is_empty() || request.language == "auto" {
            String::new()
        } else {
            format!("The audio is in {}. ", language_code_to_name(&request.language))
        };

        let (task, template) = match &request.mode {
            TranscriptMode::Transcribe => (
                "Transcribe this audio perfectly.".to_string(),
                r#"[{"start": 0.0, "end": 1.5, "text": "..."}]"#,
            ),
            TranscriptMode::Translate { target } => (
                format!(
                    "Transcribe this audio and translate it directly into {}. Return only the translated text in the 'text' field.",
                    language_code_to_name(target)
                ),
                r#"[{"start": 0.0, "end": 1.5, "text": "..."}]"#,
            ),
            TranscriptMode::Bilingual { target } => (
                format!(
                    "Transcribe this audio and also translate it into {}. Return the original transcription in the 'text' field and the translation in the 'translation' field.",
                    language_code_to_name(target)
                ),
                r#"[{"start": 0.0, "end": 1.5, "text": "...", "translation": "..."}]"#,
            ),
        };

        format!(
            "{}{} This audio is approximately {:.0} seconds long. Timestamps must start near 0.0 and end near {:.0}.\n\n\
             Return a JSON array of segments in exactly this format:\n{}\n\n\
             Strictly follow this format. Do not include markdown code blocks. Ensure timestamps are accurate.",
            language_hint, task, chunk_duration_secs, chunk_duration_secs, template
        )
    }

    /// One full attempt: upload, wait, generate, parse. The uploaded file is
    /// deleted afterwards whether the attempt succeeded or not.
    async fn attempt_transcription(
        &self,
        chunk: &AudioChunk,
        request: &ChunkRequest,
        api_key: &str,
    ) -> AttemptResult<Vec<SpeechSegment>> {
        let file = self.upload_chunk(chunk, api_key).await?;
        debug!(
            "[{}] Uploaded {} bytes as {}",
            request.label,
            chunk.audio.len(),
            file.name
        );

        let outcome = self.transcribe_uploaded(chunk, request, &file, api_key).await;
        self.delete_file(&file.name, api_key).await;
        outcome
    }

    async fn transcribe_uploaded(
        &self,
        chunk: &AudioChunk,
        request: &ChunkRequest,
        file: &UploadedFile,
        api_key: &str,
    ) -> AttemptResult<Vec<SpeechSegment>> {
        self.wait_until_active(&file.name, &file.state, api_key).await?;

        let payload = self.generate_transcript(chunk, request, &file.uri, api_key).await?;
        debug!("[{}] Raw model response: {}", request.label, payload);

        parse_segments(
            &payload,
            request.mode.is_bilingual(),
            chunk.duration_secs(),
            &request.label,
        )
        .map_err(AttemptError::Fatal)
    }

    /// Upload raw chunk bytes via the media upload endpoint.
    async fn upload_chunk(&self, chunk: &AudioChunk, api_key: &str) -> AttemptResult<UploadedFile> {
        let url = format!(
            "{}/upload/v1beta/files?uploadType=media&key={}",
            self.config.endpoint, api_key
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", chunk.mime_type.clone())
            .body(chunk.audio.clone())
            .send()
            .await
            .map_err(classify_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, "File upload"));
        }

        let payload: Value = response.json().await.map_err(classify_request_error)?;
        // The upload endpoint wraps the metadata in a "file" object
        let file = payload.get("file").cloned().unwrap_or(payload);

        let name = file
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AttemptError::Fatal(GensubError::Transcribe(
                    "Upload response missing file name".to_string(),
                ))
            })?
            .to_string();
        let uri = file
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AttemptError::Fatal(GensubError::Transcribe(
                    "Upload response missing file uri".to_string(),
                ))
            })?
            .to_string();
        let state = file
            .get("state")
            .and_then(Value::as_str)
            .unwrap_or("PROCESSING")
            .to_string();

        Ok(UploadedFile { name, uri, state })
    }

    /// Poll the file resource until it leaves PROCESSING.
    async fn wait_until_active(
        &self,
        name: &str,
        initial_state: &str,
        api_key: &str,
    ) -> AttemptResult<()> {
        let mut state = initial_state.to_string();
        let mut checks = 0;

        while state == "PROCESSING" {
            checks += 1;
            if checks > MAX_POLL_ATTEMPTS {
                return Err(AttemptError::Transient(GensubError::Transcribe(format!(
                    "Uploaded file {} did not become active in time",
                    name
                ))));
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;

            let url = format!("{}/v1beta/{}?key={}", self.config.endpoint, name, api_key);
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(classify_request_error)?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(classify_status(status, &body, "File status check"));
            }

            let payload: Value = response.json().await.map_err(classify_request_error)?;
            state = payload
                .get("state")
                .and_then(Value::as_str)
                .unwrap_or("PROCESSING")
                .to_string();
        }

        if state == "ACTIVE" {
            Ok(())
        } else {
            Err(AttemptError::Fatal(GensubError::Transcribe(format!(
                "Uploaded file {} entered state {}",
                name, state
            ))))
        }
    }

    /// Ask the model for segments referencing the uploaded file.
    async fn generate_transcript(
        &self,
        chunk: &AudioChunk,
        request: &ChunkRequest,
        file_uri: &str,
        api_key: &str,
    ) -> AttemptResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.endpoint, self.config.model, api_key
        );
        let prompt = self.build_prompt(request, chunk.duration_secs());

        let body = json!({
            "contents": [{
                "parts": [
                    { "text": prompt },
                    { "file_data": { "mime_type": chunk.mime_type, "file_uri": file_uri } }
                ]
            }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
                "responseMimeType": "application/json"
            }
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, "Content generation"));
        }

        let payload: Value = response.json().await.map_err(classify_request_error)?;
        extract_candidate_text(&payload).ok_or_else(|| {
            AttemptError::Fatal(GensubError::Transcribe(
                "Response contained no candidate text".to_string(),
            ))
        })
    }

    /// Delete the uploaded file. Failures are logged, not propagated.
    async fn delete_file(&self, name: &str, api_key: &str) {
        let url = format!("{}/v1beta/{}?key={}", self.config.endpoint, name, api_key);

        match self.client.delete(&url).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!("Failed to delete uploaded file {}: {}", name, response.status());
            }
            Ok(_) => debug!("Deleted uploaded file {}", name),
            Err(e) => warn!("Failed to delete uploaded file {}: {}", name, e),
        }
    }
}

#[async_trait]
impl TranscriberTrait for GeminiTranscriber {
    async fn transcribe_chunk(
        &self,
        chunk: &AudioChunk,
        request: &ChunkRequest,
    ) -> Result<Vec<SpeechSegment>> {
        let api_key = self.api_key()?;
        let mut backoff_ms = self.config.retry_backoff_ms;
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.attempt_transcription(chunk, request, &api_key).await {
                Ok(segments) => {
                    debug!("[{}] Parsed {} segments", request.label, segments.len());
                    return Ok(segments);
                }
                Err(AttemptError::Fatal(error)) => return Err(error),
                Err(AttemptError::Transient(error)) => {
                    if attempts >= self.config.max_retries {
                        return Err(error);
                    }
                    warn!(
                        "[{}] Attempt {} failed: {}, retrying in {} ms",
                        request.label, attempts, error, backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = backoff_ms.saturating_mul(2);
                }
            }
        }
    }

    fn check_availability(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }
}

fn classify_request_error(error: reqwest::Error) -> AttemptError {
    if error.is_timeout() || error.is_connect() {
        AttemptError::Transient(GensubError::Http(error))
    } else {
        AttemptError::Fatal(GensubError::Http(error))
    }
}

fn classify_status(status: reqwest::StatusCode, body: &str, context: &str) -> AttemptError {
    let error = GensubError::Transcribe(format!("{} failed with {}: {}", context, status, body));
    if status.as_u16() == 429 || status.is_server_error() {
        AttemptError::Transient(error)
    } else {
        AttemptError::Fatal(error)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_candidate_text(payload: &Value) -> Option<String> {
    let parts = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_transcriber() -> GeminiTranscriber {
        GeminiTranscriber::new(TranscriberConfig::default())
    }

    fn test_request(mode: TranscriptMode, language: &str) -> ChunkRequest {
        ChunkRequest {
            mode,
            language: language.to_string(),
            label: "chunk 1/1".to_string(),
        }
    }

    #[test]
    fn test_transcribe_prompt() {
        let transcriber = test_transcriber();
        let request = test_request(TranscriptMode::Transcribe, "auto");
        let prompt = transcriber.build_prompt(&request, 30.0);

        assert!(prompt.contains("Transcribe this audio perfectly."));
        assert!(prompt.contains("approximately 30 seconds"));
        assert!(prompt.contains("end near 30"));
        assert!(!prompt.contains("The audio is in"));
        assert!(!prompt.contains("translation"));
    }

    #[test]
    fn test_translate_prompt_names_target_language() {
        let transcriber = test_transcriber();
        let request = test_request(
            TranscriptMode::Translate { target: "de".to_string() },
            "auto",
        );
        let prompt = transcriber.build_prompt(&request, 12.0);

        assert!(prompt.contains("translate it directly into German"));
    }

    #[test]
    fn test_bilingual_prompt_requests_both_fields() {
        let transcriber = test_transcriber();
        let request = test_request(
            TranscriptMode::Bilingual { target: "en".to_string() },
            "ja",
        );
        let prompt = transcriber.build_prompt(&request, 8.0);

        assert!(prompt.contains("The audio is in Japanese."));
        assert!(prompt.contains("also translate it into English"));
        assert!(prompt.contains(r#""translation": "...""#));
    }

    #[test]
    fn test_extract_candidate_text() {
        let payload = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "[{\"start\": 0.0, " },
                        { "text": "\"end\": 1.0, \"text\": \"hi\"}]" }
                    ]
                }
            }]
        });

        let text = extract_candidate_text(&payload).unwrap();
        assert_eq!(text, "[{\"start\": 0.0, \"end\": 1.0, \"text\": \"hi\"}]");

        assert!(extract_candidate_text(&json!({"candidates": []})).is_none());
        assert!(extract_candidate_text(&json!({})).is_none());
    }

    #[test]
    fn test_status_classification() {
        let too_many = reqwest::StatusCode::from_u16(429).unwrap();
        let unavailable = reqwest::StatusCode::from_u16(503).unwrap();
        let bad_request = reqwest::StatusCode::from_u16(400).unwrap();

        assert!(matches!(
            classify_status(too_many, "", "test"),
            AttemptError::Transient(_)
        ));
        assert!(matches!(
            classify_status(unavailable, "", "test"),
            AttemptError::Transient(_)
        ));
        assert!(matches!(
            classify_status(bad_request, "", "test"),
            AttemptError::Fatal(_)
        ));
    }
}
