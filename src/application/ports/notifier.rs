use async_trait::async_trait;
use serde::Serialize;

use crate::domain::UserId;

pub const TRANSCRIPTION_COMPLETED_EVENT: &str = "transcription:completed";

#[derive(Debug, Clone, Serialize)]
pub struct RoomEvent {
    pub room: String,
    pub event: String,
    pub payload: serde_json::Value,
}

pub fn user_room(user_id: UserId) -> String {
    format!("user:{}", user_id.as_uuid())
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn emit(&self, event: RoomEvent) -> Result<(), NotifierError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
}
