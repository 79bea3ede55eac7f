use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Retrying,
}

impl TranscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptionStatus::Pending => "pending",
            TranscriptionStatus::Processing => "processing",
            TranscriptionStatus::Completed => "completed",
            TranscriptionStatus::Failed => "failed",
            TranscriptionStatus::Retrying => "retrying",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TranscriptionStatus::Completed | TranscriptionStatus::Failed
        )
    }

    /// Statuses that carry an error snapshot.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TranscriptionStatus::Failed | TranscriptionStatus::Retrying
        )
    }
}

impl FromStr for TranscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TranscriptionStatus::Pending),
            "processing" => Ok(TranscriptionStatus::Processing),
            "completed" => Ok(TranscriptionStatus::Completed),
            "failed" => Ok(TranscriptionStatus::Failed),
            "retrying" => Ok(TranscriptionStatus::Retrying),
            _ => Err(format!("Invalid transcription status: {}", s)),
        }
    }
}

impl fmt::Display for TranscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
