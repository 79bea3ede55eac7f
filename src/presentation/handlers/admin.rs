use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::services::{ProviderTestError, ProviderTestRequest};
use crate::presentation::state::AppState;

use super::multipart_form::UploadForm;
use super::responses::error_response;

/// Runs a sweep immediately. An overlapping run is reported as skipped, not as an error.
#[tracing::instrument(skip(state))]
pub async fn retry_sweep_handler(State(state): State<AppState>) -> Response {
    let result = state.retry_scheduler.run_once().await;
    (StatusCode::OK, Json(result)).into_response()
}

pub async fn scheduler_stats_handler(State(state): State<AppState>) -> Response {
    (StatusCode::OK, Json(state.retry_scheduler.stats())).into_response()
}

#[tracing::instrument(skip(state, multipart))]
pub async fn provider_test_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Response {
    let form = match UploadForm::read(multipart).await {
        Ok(form) => form,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    let Some(provider) = form.text("provider") else {
        return error_response(StatusCode::BAD_REQUEST, "provider is required");
    };
    let language = form.text("language");
    let Some(file) = form.file else {
        return error_response(StatusCode::BAD_REQUEST, "No audio file uploaded");
    };

    let request = ProviderTestRequest {
        provider,
        filename: file.filename,
        data: file.data.to_vec(),
        language,
    };

    match state.provider_test_harness.run(request).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e @ (ProviderTestError::EmptyAudio | ProviderTestError::UnknownProvider(_))) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "Provider test failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Provider test failed")
        }
    }
}
