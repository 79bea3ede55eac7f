use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::application::services::{ReconcileError, ReconcileOutcome, WebhookCallback};
use crate::domain::RecordingId;
use crate::presentation::state::AppState;

use super::responses::{RecordingView, error_response};

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    pub recording_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub status: &'static str,
    pub recording_id: String,
    pub reason: &'static str,
}

#[tracing::instrument(skip(state, payload))]
pub async fn transcription_webhook_handler(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    Json(payload): Json<Value>,
) -> Response {
    let recording_id = match query.recording_id.as_deref().filter(|v| !v.is_empty()) {
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(uuid) => Some(RecordingId::from_uuid(uuid)),
            Err(_) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid recording_id: {}", raw),
                );
            }
        },
        None => None,
    };

    let callback = WebhookCallback {
        recording_id,
        payload,
    };

    match state.webhook_reconciler.reconcile(callback).await {
        Ok(ReconcileOutcome::Applied(recording)) => {
            (StatusCode::OK, Json(RecordingView::from(&recording))).into_response()
        }
        Ok(ReconcileOutcome::NoOp {
            recording_id,
            reason,
        }) => (
            StatusCode::OK,
            Json(WebhookAck {
                status: "ignored",
                recording_id: recording_id.to_string(),
                reason,
            }),
        )
            .into_response(),
        Err(e @ (ReconcileError::MissingCorrelationId | ReconcileError::MissingOutput)) => {
            tracing::warn!(error = %e, "Rejected transcription webhook");
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e @ ReconcileError::CorrelationMismatch(_)) => {
            tracing::warn!(error = %e, "Unmatched transcription webhook");
            error_response(StatusCode::NOT_FOUND, e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to reconcile transcription webhook");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process webhook")
        }
    }
}
