use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use uuid::Uuid;

use crate::application::services::{TranscriptionServiceError, TransitionOutcome};
use crate::domain::{
    AudioDescriptor, Recording, RecordingId, RetryPolicy, SessionId, StoragePath, TransitionError,
    UserId,
};
use crate::presentation::state::AppState;

use super::multipart_form::UploadForm;
use super::responses::{RecordingView, error_response};

#[tracing::instrument(skip(state, multipart))]
pub async fn upload_recording_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Response {
    let form = match UploadForm::read(multipart).await {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed recording upload");
            return error_response(StatusCode::BAD_REQUEST, e);
        }
    };

    let Some(file) = form.file.as_ref().filter(|f| !f.data.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "No audio file uploaded");
    };
    let Some(session_id) = parse_uuid(form.text("session_id")) else {
        return error_response(StatusCode::BAD_REQUEST, "session_id must be a UUID");
    };
    let Some(user_id) = parse_uuid(form.text("user_id")) else {
        return error_response(StatusCode::BAD_REQUEST, "user_id must be a UUID");
    };

    let preferred_provider = form.text("preferred_provider");
    if let Some(provider) = &preferred_provider {
        if !state.transcription_service.providers().contains(provider) {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Unsupported provider: {}", provider),
            );
        }
    }

    let duration_seconds = match form.text("duration_seconds").map(|d| d.parse::<f64>()) {
        Some(Ok(d)) if d.is_finite() && d >= 0.0 => Some(d),
        Some(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "duration_seconds must be a non-negative number",
            );
        }
        None => None,
    };

    let recording_id = RecordingId::new();
    let path = StoragePath::for_recording(&recording_id, &file.filename);
    let size = file.data.len() as u64;
    let payload = file.data.clone();
    let stream = futures::stream::once(async move { Ok(payload) }).boxed();

    if let Err(e) = state.staging_store.store(&path, stream, Some(size)).await {
        tracing::error!(error = %e, "Failed to stage audio");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store audio");
    }

    let audio = AudioDescriptor::new(
        path,
        file.filename.clone(),
        audio_format(&file.filename, file.content_type.as_deref()),
        size,
    )
    .with_language(form.text("language"))
    .with_duration(duration_seconds);

    let retry = RetryPolicy::new(
        state.retry_settings.max_retries,
        state.retry_settings.backoff_multiplier,
        preferred_provider,
    );

    let recording = Recording::with_id(
        recording_id,
        SessionId::from_uuid(session_id),
        UserId::from_uuid(user_id),
        audio,
        retry,
    );

    let recording = match state.transcription_service.create_recording(recording).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create recording");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create recording");
        }
    };

    let service = Arc::clone(&state.transcription_service);
    tokio::spawn(async move {
        if let Err(e) = service.start(recording_id).await {
            tracing::warn!(recording_id = %recording_id, error = %e, "Background transcription did not start");
        }
    });

    (StatusCode::ACCEPTED, Json(RecordingView::from(&recording))).into_response()
}

#[tracing::instrument(skip(state))]
pub async fn get_recording_handler(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> Response {
    let Ok(uuid) = Uuid::parse_str(&recording_id) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid recording ID: {}", recording_id),
        );
    };

    match state
        .transcription_service
        .repository()
        .get_by_id(RecordingId::from_uuid(uuid))
        .await
    {
        Ok(Some(recording)) => (StatusCode::OK, Json(RecordingView::from(&recording))).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("Recording not found: {}", recording_id),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch recording");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch recording")
        }
    }
}

#[tracing::instrument(skip(state))]
pub async fn start_transcription_handler(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> Response {
    let Ok(uuid) = Uuid::parse_str(&recording_id) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid recording ID: {}", recording_id),
        );
    };

    match state
        .transcription_service
        .start(RecordingId::from_uuid(uuid))
        .await
    {
        Ok(TransitionOutcome::Applied(r)) | Ok(TransitionOutcome::Unchanged(r)) => {
            (StatusCode::OK, Json(RecordingView::from(&r))).into_response()
        }
        Ok(TransitionOutcome::Conflict(_)) => error_response(
            StatusCode::CONFLICT,
            "Recording was modified concurrently",
        ),
        Err(TranscriptionServiceError::NotFound(_)) => error_response(
            StatusCode::NOT_FOUND,
            format!("Recording not found: {}", recording_id),
        ),
        Err(TranscriptionServiceError::Transition(TransitionError::InvalidState { status, .. })) => {
            error_response(
                StatusCode::CONFLICT,
                format!("Recording is already {}", status),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to start transcription");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to start transcription")
        }
    }
}

fn parse_uuid(value: Option<String>) -> Option<Uuid> {
    value.and_then(|v| Uuid::parse_str(&v).ok())
}

fn audio_format(filename: &str, content_type: Option<&str>) -> String {
    let from_extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty());

    from_extension
        .or_else(|| {
            content_type
                .and_then(|ct| ct.split('/').nth(1))
                .map(|sub| sub.trim_start_matches("x-").to_lowercase())
        })
        .unwrap_or_else(|| "bin".to_string())
}
