use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::application::ports::{
    AudioSource, CompletionModel, PendingJob, PollOutcome, ProviderError, ProviderOutcome,
    TranscriptionOptions, TranscriptionProvider,
};
use crate::domain::{
    Sentiment, SpeakerLabel, TranscriptMetadata, TranscriptionResult, Utterance, WordTimestamp,
    join_utterances,
};

use super::http_errors::{classify_status, malformed_response, request_failed};

pub const ASSEMBLYAI_PROVIDER: &str = "assemblyai";

/// AssemblyAI: upload, create a transcript job, then poll it by id.
pub struct AssemblyAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AssemblyAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://api.assemblyai.com".to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    async fn upload(&self, audio: &AudioSource) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v2/upload", self.base_url))
            .header("authorization", &self.api_key)
            .header("content-type", "application/octet-stream")
            .body(audio.data.clone())
            .send()
            .await
            .map_err(|e| request_failed(ASSEMBLYAI_PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(ASSEMBLYAI_PROVIDER, status, &body));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| malformed_response(ASSEMBLYAI_PROVIDER, e))?;
        Ok(body.upload_url)
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Serialize)]
struct CreateTranscript<'a> {
    audio_url: &'a str,
    speaker_labels: bool,
    sentiment_analysis: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_detection: Option<bool>,
}

#[derive(Deserialize)]
struct TranscriptResponse {
    id: String,
    status: String,
    text: Option<String>,
    error: Option<String>,
    confidence: Option<f64>,
    audio_duration: Option<f64>,
    language_code: Option<String>,
    speech_model: Option<String>,
    #[serde(default)]
    words: Vec<AssemblyWord>,
    #[serde(default)]
    utterances: Vec<AssemblyUtterance>,
    #[serde(default)]
    sentiment_analysis_results: Vec<AssemblySentiment>,
}

#[derive(Deserialize)]
struct AssemblyWord {
    text: String,
    start: u64,
    end: u64,
    confidence: Option<f64>,
}

#[derive(Deserialize)]
struct AssemblyUtterance {
    speaker: Option<String>,
    text: String,
    start: u64,
    end: u64,
}

#[derive(Deserialize)]
struct AssemblySentiment {
    sentiment: String,
}

#[async_trait]
impl TranscriptionProvider for AssemblyAiProvider {
    fn name(&self) -> &str {
        ASSEMBLYAI_PROVIDER
    }

    fn completion_model(&self) -> CompletionModel {
        CompletionModel::Polling
    }

    async fn transcribe(
        &self,
        audio: &AudioSource,
        options: &TranscriptionOptions,
    ) -> Result<ProviderOutcome, ProviderError> {
        let audio_url = match &audio.url {
            Some(url) => url.clone(),
            None => self.upload(audio).await?,
        };

        let request = CreateTranscript {
            audio_url: &audio_url,
            speaker_labels: options.speaker_labels,
            sentiment_analysis: true,
            language_code: options.language.as_deref(),
            language_detection: options.language.is_none().then_some(true),
        };

        let response = self
            .client
            .post(format!("{}/v2/transcript", self.base_url))
            .header("authorization", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_failed(ASSEMBLYAI_PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(ASSEMBLYAI_PROVIDER, status, &body));
        }

        let body: TranscriptResponse = response
            .json()
            .await
            .map_err(|e| malformed_response(ASSEMBLYAI_PROVIDER, e))?;

        tracing::info!(job_id = %body.id, status = %body.status, "AssemblyAI transcript job created");
        Ok(ProviderOutcome::Pending(PendingJob { job_id: body.id }))
    }

    async fn poll_status(&self, job_id: &str) -> Result<PollOutcome, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v2/transcript/{}", self.base_url, job_id))
            .header("authorization", &self.api_key)
            .send()
            .await
            .map_err(|e| request_failed(ASSEMBLYAI_PROVIDER, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::job_not_found(format!(
                "assemblyai transcript {} not found",
                job_id
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(ASSEMBLYAI_PROVIDER, status, &body));
        }

        let body: TranscriptResponse = response
            .json()
            .await
            .map_err(|e| malformed_response(ASSEMBLYAI_PROVIDER, e))?;

        match body.status.as_str() {
            "completed" => normalize(body).map(PollOutcome::Completed),
            "error" => Err(ProviderError::transcription_failed(
                body.error
                    .unwrap_or_else(|| "assemblyai reported an error".to_string()),
            )),
            other => Ok(PollOutcome::StillProcessing {
                remote_status: other.to_string(),
            }),
        }
    }
}

fn normalize(body: TranscriptResponse) -> Result<TranscriptionResult, ProviderError> {
    if let Some(error) = body.error.filter(|e| !e.is_empty()) {
        return Err(ProviderError::transcription_failed(error));
    }

    let utterances: Vec<Utterance> = body
        .utterances
        .iter()
        .map(|u| Utterance::new(u.speaker.clone(), u.text.clone()))
        .collect();
    let text = if utterances.is_empty() {
        body.text.unwrap_or_default().trim().to_string()
    } else {
        join_utterances(&utterances)
    };
    if text.is_empty() {
        return Err(ProviderError::empty_transcript());
    }

    let polarities: Vec<f64> = body
        .sentiment_analysis_results
        .iter()
        .map(|s| match s.sentiment.as_str() {
            "POSITIVE" => 1.0,
            "NEGATIVE" => -1.0,
            _ => 0.0,
        })
        .collect();

    let mut metadata = TranscriptMetadata::new(
        ASSEMBLYAI_PROVIDER,
        body.speech_model.unwrap_or_else(|| "best".to_string()),
    );
    metadata.job_id = Some(body.id);
    metadata.language = body.language_code;
    metadata.confidence = body.confidence;
    metadata.sentiment = Sentiment::from_polarities(&polarities);
    metadata.speaker_labels = body
        .utterances
        .into_iter()
        .filter_map(|u| {
            Some(SpeakerLabel {
                speaker: u.speaker?,
                start: millis_to_secs(u.start),
                end: millis_to_secs(u.end),
                text: u.text,
            })
        })
        .collect();
    metadata.timestamps = body
        .words
        .into_iter()
        .map(|w| WordTimestamp {
            text: w.text,
            start: millis_to_secs(w.start),
            end: millis_to_secs(w.end),
            confidence: w.confidence,
        })
        .collect();

    Ok(TranscriptionResult {
        text,
        duration_seconds: body.audio_duration,
        metadata,
    })
}

fn millis_to_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}
