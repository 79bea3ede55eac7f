use chrono::{DateTime, Utc};

use super::{Recording, TranscriptionStatus};

/// The next value of a recording plus the pre-state it was derived from.
///
/// Persistence applies `next` only while the stored row still has
/// `expected_status` and `expected_version`.
#[derive(Debug, Clone)]
pub struct Transition {
    pub expected_status: TranscriptionStatus,
    pub expected_version: i64,
    pub next: Recording,
    pub effects: Vec<RecordingEffect>,
}

impl Transition {
    pub fn completes(&self) -> bool {
        self.effects
            .iter()
            .any(|e| matches!(e, RecordingEffect::Completed))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEffect {
    AttemptStarted { attempt_number: u32, provider: String },
    JobAccepted { provider: String, job_id: String },
    AttemptSucceeded { attempt_number: u32, duration_ms: i64 },
    AttemptFailed { attempt_number: u32, code: String },
    RetryScheduled { at: DateTime<Utc>, retry: u32 },
    MarkedFailed { code: String },
    Completed,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransitionError {
    #[error("cannot {action} a recording in status {status}")]
    InvalidState {
        action: &'static str,
        status: TranscriptionStatus,
    },
    #[error("no attempt in progress")]
    NoOpenAttempt,
    #[error("transcript is empty")]
    EmptyTranscript,
}
