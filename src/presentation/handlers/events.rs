use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::application::ports::user_room;
use crate::domain::UserId;
use crate::presentation::state::AppState;

use super::responses::error_response;

const KEEP_ALIVE_SECONDS: u64 = 15;

/// Streams the events of room `user:<id>` as server-sent events.
#[tracing::instrument(skip(state))]
pub async fn user_events_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    let Ok(uuid) = Uuid::parse_str(&user_id) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid user ID: {}", user_id),
        );
    };

    let room = user_room(UserId::from_uuid(uuid));
    let mut receiver = state.notifier.subscribe();

    let sse_stream = async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) if event.room == room => {
                    let data = serde_json::to_string(&event.payload).unwrap_or_default();
                    yield Ok::<_, Infallible>(Event::default().event(event.event).data(data));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(room = %room, skipped, "Event listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(sse_stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(KEEP_ALIVE_SECONDS))
                .text("keep-alive"),
        )
        .into_response()
}
