use std::sync::Arc;

use serde_json::Value;

use crate::application::ports::{PollOutcome, ProviderError, RepositoryError};
use crate::domain::{Recording, RecordingId, TranscriptionStatus};

use super::{TranscriptionService, TranscriptionServiceError, TransitionOutcome};

const FAILURE_STATUSES: [&str; 3] = ["failed", "canceled", "error"];
const RUNNING_STATUSES: [&str; 4] = ["starting", "queued", "processing", "running"];

/// An inbound provider callback: the correlation id from the query string plus the raw body.
#[derive(Debug, Clone)]
pub struct WebhookCallback {
    pub recording_id: Option<RecordingId>,
    pub payload: Value,
}

impl WebhookCallback {
    pub fn job_id(&self) -> Option<&str> {
        self.payload
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn remote_status(&self) -> Option<&str> {
        self.payload.get("status").and_then(Value::as_str)
    }

    fn has_output(&self) -> bool {
        self.payload.get("output").is_some_and(|o| !o.is_null())
    }

    fn is_failure(&self) -> bool {
        self.remote_status()
            .is_some_and(|s| FAILURE_STATUSES.contains(&s))
    }

    fn is_running(&self) -> bool {
        self.remote_status()
            .is_some_and(|s| RUNNING_STATUSES.contains(&s))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The callback moved the recording; carries the persisted result.
    Applied(Recording),
    NoOp {
        recording_id: RecordingId,
        reason: &'static str,
    },
}

/// Matches provider callbacks to recordings and feeds them through the same
/// transitions as synchronous and polled results.
pub struct WebhookReconciler {
    service: Arc<TranscriptionService>,
}

impl WebhookReconciler {
    pub fn new(service: Arc<TranscriptionService>) -> Self {
        Self { service }
    }

    #[tracing::instrument(skip_all, fields(recording_id, job_id, remote_status))]
    pub async fn reconcile(
        &self,
        callback: WebhookCallback,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let span = tracing::Span::current();
        if let Some(id) = callback.recording_id {
            span.record("recording_id", tracing::field::display(id));
        }
        if let Some(job_id) = callback.job_id() {
            span.record("job_id", job_id);
        }
        if let Some(status) = callback.remote_status() {
            span.record("remote_status", status);
        }

        if callback.recording_id.is_none() && callback.job_id().is_none() {
            return Err(ReconcileError::MissingCorrelationId);
        }
        if !callback.has_output() && !callback.is_failure() && !callback.is_running() {
            return Err(ReconcileError::MissingOutput);
        }

        let recording = self.locate(&callback).await?;
        let recording_id = recording.id;

        if recording.status != TranscriptionStatus::Processing {
            tracing::info!(status = %recording.status, "Callback for settled recording ignored");
            return Ok(ReconcileOutcome::NoOp {
                recording_id,
                reason: "recording is not processing",
            });
        }

        let provider_name = recording
            .provider_job
            .as_ref()
            .map(|j| j.provider.clone())
            .or_else(|| recording.last_provider().map(str::to_string));

        let parsed = match provider_name.as_deref() {
            Some(name) => self
                .service
                .providers()
                .resolve(Some(name))
                .and_then(|provider| provider.parse_callback(&callback.payload)),
            None => Err(ProviderError::rejected(
                "CALLBACK_UNATTRIBUTED",
                "recording has no attempt to attribute the callback to",
            )),
        };

        let outcome = match parsed {
            Ok(PollOutcome::StillProcessing { remote_status }) => {
                tracing::debug!(remote_status = %remote_status, "Callback reports job still running");
                return Ok(ReconcileOutcome::NoOp {
                    recording_id,
                    reason: "job still running",
                });
            }
            Ok(PollOutcome::Completed(result)) => {
                self.service.complete_with(recording, result).await?
            }
            Err(e) => {
                tracing::warn!(error = %e, "Callback reported or caused a failure");
                self.service.fail_with(recording, &e.to_failure()).await?
            }
        };

        Ok(match outcome {
            TransitionOutcome::Applied(next) => ReconcileOutcome::Applied(next),
            TransitionOutcome::Unchanged(_) => ReconcileOutcome::NoOp {
                recording_id,
                reason: "recording is not processing",
            },
            TransitionOutcome::Conflict(_) => ReconcileOutcome::NoOp {
                recording_id,
                reason: "recording changed concurrently",
            },
        })
    }

    async fn locate(&self, callback: &WebhookCallback) -> Result<Recording, ReconcileError> {
        let repository = self.service.repository();

        if let Some(id) = callback.recording_id {
            let recording = repository.get_by_id(id).await?.ok_or_else(|| {
                ReconcileError::CorrelationMismatch(format!("unknown recording {}", id))
            })?;

            let recorded_job = recording.provider_job.as_ref().map(|j| j.job_id.as_str());
            if let (Some(job_id), Some(recorded)) = (callback.job_id(), recorded_job) {
                if recorded != job_id {
                    return Err(ReconcileError::CorrelationMismatch(format!(
                        "job {} does not belong to recording {}",
                        job_id, id
                    )));
                }
            }
            return Ok(recording);
        }

        let job_id = callback.job_id().ok_or(ReconcileError::MissingCorrelationId)?;
        for provider in self.service.providers().webhook_capable() {
            if let Some(recording) = repository.find_by_job_id(&provider, job_id).await? {
                return Ok(recording);
            }
        }
        Err(ReconcileError::CorrelationMismatch(format!(
            "no recording for job {}",
            job_id
        )))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("callback carries neither a recording id nor a job id")]
    MissingCorrelationId,
    #[error("callback has no output")]
    MissingOutput,
    #[error("correlation mismatch: {0}")]
    CorrelationMismatch(String),
    #[error("service: {0}")]
    Service(#[from] TranscriptionServiceError),
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
}
