use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::presentation::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub default_provider: String,
    pub providers: Vec<String>,
    pub scheduler_running: bool,
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let providers = state.transcription_service.providers();
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            default_provider: providers.default_provider().to_string(),
            providers: providers.names(),
            scheduler_running: state.retry_scheduler.is_running(),
        }),
    )
}
