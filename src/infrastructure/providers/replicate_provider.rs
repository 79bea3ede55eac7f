use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::application::ports::{
    AudioSource, CompletionModel, PendingJob, PollOutcome, ProviderError, ProviderOutcome,
    TranscriptionOptions, TranscriptionProvider,
};
use crate::domain::{
    SpeakerLabel, TranscriptMetadata, TranscriptionResult, Utterance, join_utterances,
};

use super::http_errors::{classify_status, malformed_response, request_failed};

pub const REPLICATE_PROVIDER: &str = "replicate";

/// Replicate predictions: created with a webhook, resolved by callback or by polling.
pub struct ReplicateProvider {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
    model_version: String,
}

impl ReplicateProvider {
    pub fn new(api_token: String, model_version: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_token,
            base_url: base_url
                .unwrap_or_else(|| "https://api.replicate.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            model_version,
        }
    }

    fn model_name(&self) -> &str {
        self.model_version
            .split(':')
            .next()
            .unwrap_or(&self.model_version)
    }
}

#[async_trait]
impl TranscriptionProvider for ReplicateProvider {
    fn name(&self) -> &str {
        REPLICATE_PROVIDER
    }

    fn completion_model(&self) -> CompletionModel {
        CompletionModel::Webhook
    }

    async fn transcribe(
        &self,
        audio: &AudioSource,
        options: &TranscriptionOptions,
    ) -> Result<ProviderOutcome, ProviderError> {
        let audio_ref = match &audio.url {
            Some(url) => url.clone(),
            None => format!(
                "data:{};base64,{}",
                audio.content_type,
                STANDARD.encode(&audio.data)
            ),
        };

        let mut input = json!({
            "audio": audio_ref,
            "diarization": options.speaker_labels,
        });
        if let Some(language) = &options.language {
            input["language"] = json!(language);
        }

        let mut request = json!({
            "version": self.model_version,
            "input": input,
        });
        if let Some(webhook) = &options.webhook_url {
            request["webhook"] = json!(webhook);
            request["webhook_events_filter"] = json!(["completed"]);
        }

        let response = self
            .client
            .post(format!("{}/v1/predictions", self.base_url))
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_failed(REPLICATE_PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(REPLICATE_PROVIDER, status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| malformed_response(REPLICATE_PROVIDER, e))?;
        let job_id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed_response(REPLICATE_PROVIDER, "prediction id missing"))?;

        tracing::info!(
            job_id = %job_id,
            webhook = options.webhook_url.is_some(),
            "Replicate prediction created"
        );
        Ok(ProviderOutcome::Pending(PendingJob {
            job_id: job_id.to_string(),
        }))
    }

    async fn poll_status(&self, job_id: &str) -> Result<PollOutcome, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/predictions/{}", self.base_url, job_id))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| request_failed(REPLICATE_PROVIDER, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::job_not_found(format!(
                "replicate prediction {} not found",
                job_id
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(REPLICATE_PROVIDER, status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| malformed_response(REPLICATE_PROVIDER, e))?;
        parse_prediction(&body, self.model_name())
    }

    fn parse_callback(&self, payload: &Value) -> Result<PollOutcome, ProviderError> {
        parse_prediction(payload, self.model_name())
    }
}

/// Normalizes a prediction object as returned by the API or posted to the webhook.
pub fn parse_prediction(prediction: &Value, model: &str) -> Result<PollOutcome, ProviderError> {
    let output = prediction.get("output").filter(|o| !o.is_null());
    let status = prediction
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or(if output.is_some() { "succeeded" } else { "unknown" });

    match status {
        "starting" | "processing" | "queued" | "running" => Ok(PollOutcome::StillProcessing {
            remote_status: status.to_string(),
        }),
        "succeeded" => {
            let output = output.ok_or_else(|| {
                ProviderError::rejected("MISSING_OUTPUT", "prediction succeeded without output")
            })?;
            normalize_output(prediction, output, model).map(PollOutcome::Completed)
        }
        "failed" | "error" => Err(ProviderError::transcription_failed(error_text(prediction))),
        "canceled" => Err(ProviderError::rejected(
            "PREDICTION_CANCELED",
            "prediction was canceled",
        )),
        other => Err(malformed_response(
            REPLICATE_PROVIDER,
            format!("unknown prediction status '{}'", other),
        )),
    }
}

fn error_text(prediction: &Value) -> String {
    match prediction.get("error") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Null) | None => "prediction failed".to_string(),
        Some(other) => other.to_string(),
    }
}

fn normalize_output(
    prediction: &Value,
    output: &Value,
    model: &str,
) -> Result<TranscriptionResult, ProviderError> {
    let segments = match output {
        Value::Array(items) => Some(items.as_slice()),
        Value::Object(map) => map.get("segments").and_then(Value::as_array).map(Vec::as_slice),
        _ => None,
    };

    let mut speaker_labels = Vec::new();
    let text = match (output, segments) {
        (Value::String(s), _) => s.trim().to_string(),
        (_, Some(segments)) if !segments.is_empty() => {
            let utterances: Vec<Utterance> = segments
                .iter()
                .filter_map(|segment| match segment {
                    Value::String(s) => Some(Utterance::new(None, s.clone())),
                    Value::Object(_) => {
                        let text = segment.get("text").and_then(Value::as_str)?;
                        let speaker = segment
                            .get("speaker")
                            .and_then(Value::as_str)
                            .map(str::to_string);
                        if let Some(speaker) = &speaker {
                            speaker_labels.push(SpeakerLabel {
                                speaker: speaker.clone(),
                                start: number(segment, "start"),
                                end: number(segment, "end"),
                                text: text.trim().to_string(),
                            });
                        }
                        Some(Utterance::new(speaker, text))
                    }
                    _ => None,
                })
                .collect();
            join_utterances(&utterances)
        }
        (Value::Object(map), _) => map
            .get("transcription")
            .or_else(|| map.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        _ => String::new(),
    };

    if text.is_empty() {
        return Err(ProviderError::empty_transcript());
    }

    let mut metadata = TranscriptMetadata::new(REPLICATE_PROVIDER, model);
    metadata.job_id = prediction
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string);
    metadata.language = output
        .get("detected_language")
        .or_else(|| output.get("language"))
        .and_then(Value::as_str)
        .map(str::to_string);
    metadata.speaker_labels = speaker_labels;
    metadata.processing_time_ms = prediction
        .pointer("/metrics/predict_time")
        .and_then(Value::as_f64)
        .map(|secs| (secs * 1000.0) as i64);

    let duration_seconds = metadata.speaker_labels.last().map(|s| s.end);

    Ok(TranscriptionResult {
        text,
        duration_seconds,
        metadata,
    })
}

fn number(value: &Value, key: &str) -> f64 {
    value.get(key).and_then(Value::as_f64).unwrap_or_default()
}
