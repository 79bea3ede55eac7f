use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Attempting,
    Success,
    Failed,
}

/// One provider invocation against a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub attempt_number: u32,
    pub provider_name: String,
    pub outcome: AttemptOutcome,
    pub job_id: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl Attempt {
    pub fn start(attempt_number: u32, provider_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            attempt_number,
            provider_name: provider_name.into(),
            outcome: AttemptOutcome::Attempting,
            job_id: None,
            error: None,
            started_at: now,
            completed_at: None,
            duration_ms: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.outcome == AttemptOutcome::Attempting
    }

    pub(crate) fn finish(
        &mut self,
        outcome: AttemptOutcome,
        error: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.outcome = outcome;
        self.error = error;
        self.completed_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0));
    }
}
