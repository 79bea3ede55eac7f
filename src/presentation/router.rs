use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::application::services::WEBHOOK_PATH;
use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::handlers::{
    get_recording_handler, health_handler, provider_test_handler, retry_sweep_handler,
    scheduler_stats_handler, start_transcription_handler, transcription_webhook_handler,
    upload_recording_handler, user_events_handler,
};
use crate::presentation::state::AppState;

const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let uploads = Router::new()
        .route("/api/v1/recordings", post(upload_recording_handler))
        .route("/api/v1/admin/provider-test", post(provider_test_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/recordings/{id}", get(get_recording_handler))
        .route(
            "/api/v1/recordings/{id}/transcribe",
            post(start_transcription_handler),
        )
        .route(WEBHOOK_PATH, post(transcription_webhook_handler))
        .route("/api/v1/admin/retry-sweep", post(retry_sweep_handler))
        .route(
            "/api/v1/admin/scheduler/stats",
            get(scheduler_stats_handler),
        )
        .route("/api/v1/users/{user_id}/events", get(user_events_handler))
        .merge(uploads)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
