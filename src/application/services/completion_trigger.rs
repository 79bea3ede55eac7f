use std::sync::Arc;

use serde_json::json;

use crate::application::ports::{
    NoteGenerator, Notifier, RoomEvent, SessionLifecycle, TRANSCRIPTION_COMPLETED_EVENT, user_room,
};
use crate::domain::Recording;

/// Work that follows a recording reaching `completed`. Every step is best effort:
/// failures are logged and never revert the recording.
pub struct CompletionTrigger {
    sessions: Arc<dyn SessionLifecycle>,
    notes: Arc<dyn NoteGenerator>,
    notifier: Arc<dyn Notifier>,
}

impl CompletionTrigger {
    pub fn new(
        sessions: Arc<dyn SessionLifecycle>,
        notes: Arc<dyn NoteGenerator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            sessions,
            notes,
            notifier,
        }
    }

    #[tracing::instrument(skip_all, fields(recording_id = %recording.id, session_id = %recording.session_id))]
    pub async fn on_completed(&self, recording: &Recording) {
        if let Err(e) = self.sessions.mark_completed(recording.session_id).await {
            tracing::warn!(error = %e, "Failed to mark session completed");
        }

        match self
            .notes
            .request_session_summary(recording.session_id, recording.id)
            .await
        {
            Ok(()) => tracing::debug!("Session summary requested"),
            Err(e) => tracing::warn!(error = %e, "Session summary generation failed"),
        }

        if let Err(e) = self.notifier.emit(completion_event(recording)).await {
            tracing::warn!(error = %e, "Failed to emit completion notification");
        }
    }
}

/// Builds the notification for the owner's room. Carries metadata only, never transcript text.
pub fn completion_event(recording: &Recording) -> RoomEvent {
    let metadata = recording.metadata.as_ref();
    let word_count = recording
        .transcript
        .as_deref()
        .map(|t| t.split_whitespace().count())
        .unwrap_or_default();

    RoomEvent {
        room: user_room(recording.user_id),
        event: TRANSCRIPTION_COMPLETED_EVENT.to_string(),
        payload: json!({
            "recordingId": recording.id.as_uuid().to_string(),
            "sessionId": recording.session_id.as_uuid().to_string(),
            "status": recording.status.as_str(),
            "metadata": {
                "provider": metadata.map(|m| m.provider.clone()),
                "model": metadata.map(|m| m.model.clone()),
                "language": metadata.and_then(|m| m.language.clone()),
                "jobId": metadata.and_then(|m| m.job_id.clone()),
                "confidence": metadata.and_then(|m| m.confidence),
                "sentiment": metadata.and_then(|m| m.sentiment.clone()),
                "speakerCount": metadata.map(|m| m.speaker_count()).unwrap_or_default(),
                "durationSeconds": recording.audio.duration_seconds,
                "wordCount": word_count,
            },
        }),
    }
}
