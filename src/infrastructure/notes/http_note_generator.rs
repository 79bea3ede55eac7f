use async_trait::async_trait;
use serde::Serialize;

use crate::application::ports::{NoteGenerator, NoteGeneratorError};
use crate::domain::{RecordingId, SessionId};

/// Requests session-summary generation from the notes service over HTTP.
pub struct HttpNoteGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpNoteGenerator {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryRequest {
    session_id: String,
    recording_id: String,
}

#[async_trait]
impl NoteGenerator for HttpNoteGenerator {
    async fn request_session_summary(
        &self,
        session_id: SessionId,
        recording_id: RecordingId,
    ) -> Result<(), NoteGeneratorError> {
        let mut request = self.client.post(&self.endpoint).json(&SummaryRequest {
            session_id: session_id.as_uuid().to_string(),
            recording_id: recording_id.as_uuid().to_string(),
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NoteGeneratorError::ApiRequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(NoteGeneratorError::Rejected(format!(
                "status {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

/// Used when no notes service is configured.
pub struct DisabledNoteGenerator;

#[async_trait]
impl NoteGenerator for DisabledNoteGenerator {
    async fn request_session_summary(
        &self,
        session_id: SessionId,
        _recording_id: RecordingId,
    ) -> Result<(), NoteGeneratorError> {
        tracing::debug!(session_id = %session_id, "Note generation disabled, skipping summary");
        Ok(())
    }
}
