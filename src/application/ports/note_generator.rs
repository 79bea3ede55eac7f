use async_trait::async_trait;

use crate::domain::{RecordingId, SessionId};

/// Collaborator that authors the session summary once a transcript exists.
#[async_trait]
pub trait NoteGenerator: Send + Sync {
    async fn request_session_summary(
        &self,
        session_id: SessionId,
        recording_id: RecordingId,
    ) -> Result<(), NoteGeneratorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NoteGeneratorError {
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("rejected by note service: {0}")]
    Rejected(String),
}
