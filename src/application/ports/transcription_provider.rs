use std::fmt;

use async_trait::async_trait;

use crate::domain::{Failure, TranscriptionResult};

/// How a provider delivers its final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionModel {
    /// The transcript is returned in the response to `transcribe`.
    Synchronous,
    /// `transcribe` returns a job id that must be polled.
    Polling,
    /// `transcribe` returns a job id; the provider calls back when done. The job can also be polled.
    Webhook,
}

impl CompletionModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionModel::Synchronous => "synchronous",
            CompletionModel::Polling => "polling",
            CompletionModel::Webhook => "webhook",
        }
    }

    pub fn is_pollable(&self) -> bool {
        !matches!(self, CompletionModel::Synchronous)
    }
}

/// Audio handed to a provider: raw bytes plus, when available, a URL the provider can fetch.
#[derive(Debug, Clone)]
pub struct AudioSource {
    pub data: Vec<u8>,
    pub filename: String,
    pub content_type: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TranscriptionOptions {
    pub language: Option<String>,
    pub speaker_labels: bool,
    /// Echoed back by webhook providers so callbacks can be matched to a recording.
    pub correlation_id: Option<String>,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingJob {
    pub job_id: String,
}

#[derive(Debug, Clone)]
pub enum ProviderOutcome {
    Completed(TranscriptionResult),
    Pending(PendingJob),
}

#[derive(Debug, Clone)]
pub enum PollOutcome {
    Completed(TranscriptionResult),
    StillProcessing { remote_status: String },
}

#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    fn name(&self) -> &str;

    fn completion_model(&self) -> CompletionModel;

    async fn transcribe(
        &self,
        audio: &AudioSource,
        options: &TranscriptionOptions,
    ) -> Result<ProviderOutcome, ProviderError>;

    async fn poll_status(&self, job_id: &str) -> Result<PollOutcome, ProviderError> {
        Err(ProviderError::job_not_found(format!(
            "{} does not issue pollable jobs (job {})",
            self.name(),
            job_id
        )))
    }

    /// Normalizes an out-of-band callback payload.
    fn parse_callback(&self, _payload: &serde_json::Value) -> Result<PollOutcome, ProviderError> {
        Err(ProviderError::rejected(
            "CALLBACK_UNSUPPORTED",
            format!("{} does not deliver webhooks", self.name()),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Unavailable,
    Rejected,
    JobNotFound,
    Unsupported,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProviderErrorKind::Unavailable => "provider unavailable",
            ProviderErrorKind::Rejected => "provider rejected request",
            ProviderErrorKind::JobNotFound => "job not found",
            ProviderErrorKind::Unsupported => "unsupported provider",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} [{code}]: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub code: String,
    pub message: String,
    pub recoverable: bool,
}

impl ProviderError {
    pub fn unavailable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Unavailable,
            code: code.into(),
            message: message.into(),
            recoverable: true,
        }
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Rejected,
            code: code.into(),
            message: message.into(),
            recoverable: false,
        }
    }

    /// The provider ran the job and reported a failure without marking it permanent.
    pub fn transcription_failed(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Rejected,
            code: "TRANSCRIPTION_FAILED".to_string(),
            message: message.into(),
            recoverable: true,
        }
    }

    pub fn empty_transcript() -> Self {
        let failure = Failure::empty_transcript();
        Self::rejected(failure.code, failure.message)
    }

    pub fn job_not_found(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::JobNotFound,
            code: "JOB_NOT_FOUND".to_string(),
            message: message.into(),
            recoverable: false,
        }
    }

    pub fn unsupported(provider: &str) -> Self {
        Self {
            kind: ProviderErrorKind::Unsupported,
            code: "UNSUPPORTED_PROVIDER".to_string(),
            message: format!("provider '{}' is not configured", provider),
            recoverable: false,
        }
    }

    pub fn to_failure(&self) -> Failure {
        Failure::new(self.code.clone(), self.message.clone(), self.recoverable)
    }
}
