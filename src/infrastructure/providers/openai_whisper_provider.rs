use std::time::Instant;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;

use crate::application::ports::{
    AudioSource, CompletionModel, ProviderError, ProviderOutcome, TranscriptionOptions,
    TranscriptionProvider,
};
use crate::domain::{TranscriptMetadata, TranscriptionResult, WordTimestamp};

use super::http_errors::{classify_status, malformed_response, request_failed};

pub const OPENAI_PROVIDER: &str = "openai";

/// OpenAI Whisper: the transcript comes back in the response body.
pub struct OpenAiWhisperProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiWhisperProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "whisper-1".to_string()),
        }
    }
}

#[derive(Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    language: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
    #[serde(default)]
    words: Vec<VerboseWord>,
}

#[derive(Deserialize)]
struct VerboseSegment {
    avg_logprob: Option<f64>,
}

#[derive(Deserialize)]
struct VerboseWord {
    word: String,
    start: f64,
    end: f64,
}

#[async_trait]
impl TranscriptionProvider for OpenAiWhisperProvider {
    fn name(&self) -> &str {
        OPENAI_PROVIDER
    }

    fn completion_model(&self) -> CompletionModel {
        CompletionModel::Synchronous
    }

    async fn transcribe(
        &self,
        audio: &AudioSource,
        options: &TranscriptionOptions,
    ) -> Result<ProviderOutcome, ProviderError> {
        let url = format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'));
        let started = Instant::now();

        let file_part = multipart::Part::bytes(audio.data.clone())
            .file_name(audio.filename.clone())
            .mime_str(&audio.content_type)
            .map_err(|e| ProviderError::rejected("INVALID_AUDIO", format!("mime: {}", e)))?;

        let mut form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .text("timestamp_granularities[]", "word")
            .part("file", file_part);
        if let Some(language) = &options.language {
            form = form.text("language", language.clone());
        }

        tracing::debug!(model = %self.model, "Sending audio to OpenAI Whisper API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| request_failed(OPENAI_PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(classify_status(OPENAI_PROVIDER, status, &body));
        }

        let body: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| malformed_response(OPENAI_PROVIDER, e))?;

        let text = body.text.trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::empty_transcript());
        }

        let mut metadata = TranscriptMetadata::new(OPENAI_PROVIDER, self.model.clone());
        metadata.language = body.language.or_else(|| options.language.clone());
        metadata.confidence = mean_confidence(&body.segments);
        metadata.timestamps = body
            .words
            .into_iter()
            .map(|w| WordTimestamp {
                text: w.word,
                start: w.start,
                end: w.end,
                confidence: None,
            })
            .collect();
        metadata.processing_time_ms = Some(started.elapsed().as_millis() as i64);

        tracing::info!(chars = text.len(), "OpenAI Whisper transcription completed");

        Ok(ProviderOutcome::Completed(TranscriptionResult {
            text,
            duration_seconds: body.duration,
            metadata,
        }))
    }
}

fn mean_confidence(segments: &[VerboseSegment]) -> Option<f64> {
    let probs: Vec<f64> = segments
        .iter()
        .filter_map(|s| s.avg_logprob)
        .map(f64::exp)
        .collect();
    if probs.is_empty() {
        return None;
    }
    Some(probs.iter().sum::<f64>() / probs.len() as f64)
}
