use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const RETRY_BUDGET_EXHAUSTED: &str = "RETRY_BUDGET_EXHAUSTED";
pub const EMPTY_TRANSCRIPT: &str = "EMPTY_TRANSCRIPT";

/// A provider-independent description of why an attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub code: String,
    pub message: String,
    pub recoverable: bool,
}

impl Failure {
    pub fn new(code: impl Into<String>, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            recoverable,
        }
    }

    pub fn empty_transcript() -> Self {
        Self::new(
            EMPTY_TRANSCRIPT,
            "provider returned an empty transcript",
            false,
        )
    }
}

/// Last failure recorded on a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSnapshot {
    pub message: String,
    pub code: String,
    pub timestamp: DateTime<Utc>,
    pub attempt_number: u32,
    pub provider_name: String,
    pub is_recoverable: bool,
}
