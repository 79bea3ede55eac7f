use async_trait::async_trait;

use crate::domain::SessionId;

#[async_trait]
pub trait SessionLifecycle: Send + Sync {
    async fn mark_completed(&self, session_id: SessionId) -> Result<(), SessionLifecycleError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionLifecycleError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("update failed: {0}")]
    UpdateFailed(String),
}
