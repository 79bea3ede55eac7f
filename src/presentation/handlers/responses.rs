use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Attempt, Recording, TranscriptMetadata, TranscriptionStatus};
use crate::infrastructure::observability::sanitize_error_message;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioView {
    pub filename: String,
    pub format: String,
    pub size_bytes: u64,
    pub duration_seconds: Option<f64>,
    pub language: Option<String>,
    pub available: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryView {
    pub max_retries: u32,
    pub current_retry: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub preferred_provider: Option<String>,
    pub fallback_enabled: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorView {
    pub code: String,
    pub message: String,
    pub is_recoverable: bool,
    pub attempt_number: u32,
    pub provider_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Client-facing projection of a recording. Error text is sanitized.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingView {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub status: TranscriptionStatus,
    pub transcript: Option<String>,
    pub metadata: Option<TranscriptMetadata>,
    pub audio: AudioView,
    pub attempts: Vec<Attempt>,
    pub retry: RetryView,
    pub error: Option<ErrorView>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Recording> for RecordingView {
    fn from(r: &Recording) -> Self {
        Self {
            id: r.id.as_uuid().to_string(),
            session_id: r.session_id.as_uuid().to_string(),
            user_id: r.user_id.as_uuid().to_string(),
            status: r.status,
            transcript: r.transcript.clone(),
            metadata: r.metadata.clone(),
            audio: AudioView {
                filename: r.audio.filename.clone(),
                format: r.audio.format.clone(),
                size_bytes: r.audio.size_bytes,
                duration_seconds: r.audio.duration_seconds,
                language: r.audio.language.clone(),
                available: r.audio.storage_path.is_some(),
            },
            attempts: r
                .attempts
                .iter()
                .cloned()
                .map(|mut a| {
                    a.error = a.error.as_deref().map(sanitize_error_message);
                    a
                })
                .collect(),
            retry: RetryView {
                max_retries: r.retry.max_retries,
                current_retry: r.retry.current_retry,
                next_retry_at: r.retry.next_retry_at,
                preferred_provider: r.retry.preferred_provider.clone(),
                fallback_enabled: r.retry.fallback_enabled,
            },
            error: r.last_error.as_ref().map(|e| ErrorView {
                code: e.code.clone(),
                message: sanitize_error_message(&e.message),
                is_recoverable: e.is_recoverable,
                attempt_number: e.attempt_number,
                provider_name: e.provider_name.clone(),
                timestamp: e.timestamp,
            }),
            version: r.version,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
