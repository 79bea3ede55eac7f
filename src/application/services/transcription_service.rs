use std::sync::Arc;

use chrono::Utc;
use tracing::Instrument;

use crate::application::ports::{
    AudioSource, CompletionModel, PollOutcome, ProviderError, ProviderOutcome, RecordingRepository,
    RepositoryError, StagingStore, StagingStoreError, TranscriptionOptions,
};
use crate::domain::{
    BackoffPolicy, Failure, Recording, RecordingEffect, RecordingId, TranscriptionResult,
    TranscriptionStatus, Transition, TransitionError,
};

use super::{CompletionTrigger, ProviderRegistry};

pub const WEBHOOK_PATH: &str = "/api/v1/webhooks/transcription";

/// Result of driving a recording through one step of its lifecycle.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The transition was persisted; carries the new value.
    Applied(Recording),
    /// Nothing to do, e.g. the provider job is still running.
    Unchanged(Recording),
    /// Another writer changed the recording first; this step was dropped.
    Conflict(RecordingId),
}

impl TransitionOutcome {
    pub fn recording(&self) -> Option<&Recording> {
        match self {
            TransitionOutcome::Applied(r) | TransitionOutcome::Unchanged(r) => Some(r),
            TransitionOutcome::Conflict(_) => None,
        }
    }

    pub fn status(&self) -> Option<TranscriptionStatus> {
        self.recording().map(|r| r.status)
    }
}

/// The recording state machine's I/O shell: invokes providers, derives
/// transitions from their outcomes and persists them conditionally.
pub struct TranscriptionService {
    repository: Arc<dyn RecordingRepository>,
    providers: Arc<ProviderRegistry>,
    staging_store: Arc<dyn StagingStore>,
    completion: Arc<CompletionTrigger>,
    backoff: BackoffPolicy,
    public_base_url: Option<String>,
}

impl TranscriptionService {
    pub fn new(
        repository: Arc<dyn RecordingRepository>,
        providers: Arc<ProviderRegistry>,
        staging_store: Arc<dyn StagingStore>,
        completion: Arc<CompletionTrigger>,
        backoff: BackoffPolicy,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            repository,
            providers,
            staging_store,
            completion,
            backoff,
            public_base_url,
        }
    }

    pub fn providers(&self) -> &Arc<ProviderRegistry> {
        &self.providers
    }

    pub fn repository(&self) -> &Arc<dyn RecordingRepository> {
        &self.repository
    }

    pub async fn create_recording(
        &self,
        recording: Recording,
    ) -> Result<Recording, TranscriptionServiceError> {
        self.repository.create(&recording).await?;
        tracing::info!(
            recording_id = %recording.id,
            session_id = %recording.session_id,
            "Recording created"
        );
        Ok(recording)
    }

    /// Drives a `pending` recording through its first provider invocation.
    pub async fn start(&self, id: RecordingId) -> Result<TransitionOutcome, TranscriptionServiceError> {
        let recording = self
            .repository
            .get_by_id(id)
            .await?
            .ok_or(TranscriptionServiceError::NotFound(id))?;

        if recording.status != TranscriptionStatus::Pending {
            return Err(TransitionError::InvalidState {
                action: "start transcription of",
                status: recording.status,
            }
            .into());
        }

        self.drive(recording).await
    }

    /// Starts a `pending` recording the upload path never got going, e.g. after a crash.
    pub async fn resume_pending(
        &self,
        recording: Recording,
    ) -> Result<TransitionOutcome, TranscriptionServiceError> {
        if recording.status != TranscriptionStatus::Pending {
            return Ok(TransitionOutcome::Unchanged(recording));
        }
        self.drive(recording).await
    }

    /// Re-drives a recording selected by the retry sweep.
    pub async fn retry(&self, recording: Recording) -> Result<TransitionOutcome, TranscriptionServiceError> {
        if !recording.is_retry_eligible(Utc::now()) {
            return Err(TranscriptionServiceError::NotEligible(recording.id));
        }
        self.drive(recording).await
    }

    /// Polls the in-flight job of a `processing` recording.
    pub async fn poll(&self, recording: Recording) -> Result<TransitionOutcome, TranscriptionServiceError> {
        let Some(job) = recording.provider_job.clone() else {
            return Ok(TransitionOutcome::Unchanged(recording));
        };
        if recording.status != TranscriptionStatus::Processing {
            return Ok(TransitionOutcome::Unchanged(recording));
        }

        let outcome = match self.providers.resolve(Some(&job.provider)) {
            Ok(provider) => provider.poll_status(&job.job_id).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(PollOutcome::StillProcessing { remote_status }) => {
                tracing::debug!(
                    recording_id = %recording.id,
                    job_id = %job.job_id,
                    remote_status = %remote_status,
                    "Provider job still running"
                );
                Ok(TransitionOutcome::Unchanged(recording))
            }
            Ok(PollOutcome::Completed(result)) => self.complete_with(recording, result).await,
            Err(e) => self.fail_with(recording, &e.to_failure()).await,
        }
    }

    /// Closes an attempt that never reached a provider response, e.g. after a crash.
    pub async fn recover_stalled(
        &self,
        recording: Recording,
    ) -> Result<TransitionOutcome, TranscriptionServiceError> {
        let failure = Failure::new(
            "ATTEMPT_INTERRUPTED",
            "transcription attempt did not finish",
            true,
        );
        self.fail_with(recording, &failure).await
    }

    /// processing -> completed, followed by the downstream trigger.
    pub async fn complete_with(
        &self,
        recording: Recording,
        result: TranscriptionResult,
    ) -> Result<TransitionOutcome, TranscriptionServiceError> {
        let transition = match recording.complete(result, Utc::now()) {
            Ok(t) => t,
            Err(TransitionError::EmptyTranscript) => {
                return self
                    .fail_with(recording, &Failure::empty_transcript())
                    .await;
            }
            Err(TransitionError::InvalidState { status, .. }) => {
                tracing::debug!(
                    recording_id = %recording.id,
                    status = %status,
                    "Ignoring completion for recording that is not processing"
                );
                return Ok(TransitionOutcome::Unchanged(recording));
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = self.commit(transition).await?;
        if let TransitionOutcome::Applied(completed) = &outcome {
            self.completion.on_completed(completed).await;
        }
        Ok(outcome)
    }

    /// processing -> retrying | failed.
    pub async fn fail_with(
        &self,
        recording: Recording,
        failure: &Failure,
    ) -> Result<TransitionOutcome, TranscriptionServiceError> {
        match recording.fail(failure, Utc::now(), &self.backoff) {
            Ok(transition) => self.commit(transition).await,
            Err(TransitionError::InvalidState { status, .. }) => {
                tracing::debug!(
                    recording_id = %recording.id,
                    status = %status,
                    "Ignoring failure for recording that is not processing"
                );
                Ok(TransitionOutcome::Unchanged(recording))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn drive(&self, recording: Recording) -> Result<TransitionOutcome, TranscriptionServiceError> {
        let provider_name = self.select_provider(&recording);
        let span = tracing::info_span!(
            "transcription_attempt",
            recording_id = %recording.id,
            provider = %provider_name,
            attempt = recording.attempts.len() + 1,
        );
        self.run_attempt(recording, provider_name).instrument(span).await
    }

    async fn run_attempt(
        &self,
        recording: Recording,
        provider_name: String,
    ) -> Result<TransitionOutcome, TranscriptionServiceError> {
        let started = recording.begin_attempt(&provider_name, Utc::now())?;
        let recording = match self.commit(started).await? {
            TransitionOutcome::Applied(r) => r,
            other => return Ok(other),
        };

        match self.invoke(&recording, &provider_name).await {
            Ok(ProviderOutcome::Completed(result)) => self.complete_with(recording, result).await,
            Ok(ProviderOutcome::Pending(job)) => {
                let transition = recording.accept_job(&provider_name, &job.job_id, Utc::now())?;
                self.commit(transition).await
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    recoverable = e.recoverable,
                    "Provider invocation failed"
                );
                self.fail_with(recording, &e.to_failure()).await
            }
        }
    }

    fn select_provider(&self, recording: &Recording) -> String {
        recording
            .retry
            .preferred_provider
            .clone()
            .or_else(|| recording.last_provider().map(str::to_string))
            .unwrap_or_else(|| self.providers.default_provider().to_string())
    }

    async fn invoke(
        &self,
        recording: &Recording,
        provider_name: &str,
    ) -> Result<ProviderOutcome, ProviderError> {
        let provider = self.providers.resolve(Some(provider_name))?;

        let path = recording.audio.storage_path.as_ref().ok_or_else(|| {
            ProviderError::rejected("AUDIO_UNAVAILABLE", "audio has been purged from storage")
        })?;

        let data = self.staging_store.fetch(path).await.map_err(|e| match e {
            StagingStoreError::NotFound(msg) => ProviderError::rejected("AUDIO_UNAVAILABLE", msg),
            other => ProviderError::unavailable("STORAGE_UNAVAILABLE", other.to_string()),
        })?;

        let url = match self.staging_store.reachable_url(path).await {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!(error = %e, "No reachable URL for staged audio");
                None
            }
        };

        let audio = AudioSource {
            data,
            filename: recording.audio.filename.clone(),
            content_type: recording.audio.content_type(),
            url,
        };

        let webhook_url = match provider.completion_model() {
            CompletionModel::Webhook => self.public_base_url.as_deref().map(|base| {
                format!(
                    "{}{}?recording_id={}",
                    base.trim_end_matches('/'),
                    WEBHOOK_PATH,
                    recording.id.as_uuid()
                )
            }),
            _ => None,
        };

        let options = TranscriptionOptions {
            language: recording.audio.language.clone(),
            speaker_labels: true,
            correlation_id: Some(recording.id.as_uuid().to_string()),
            webhook_url,
        };

        tracing::debug!(bytes = audio.data.len(), "Invoking transcription provider");
        provider.transcribe(&audio, &options).await
    }

    async fn commit(&self, transition: Transition) -> Result<TransitionOutcome, TranscriptionServiceError> {
        let id = transition.next.id;
        if !self.repository.apply(&transition).await? {
            tracing::info!(
                recording_id = %id,
                expected_status = %transition.expected_status,
                expected_version = transition.expected_version,
                "Recording changed concurrently; transition dropped"
            );
            return Ok(TransitionOutcome::Conflict(id));
        }

        for effect in &transition.effects {
            log_effect(id, effect);
        }
        Ok(TransitionOutcome::Applied(transition.next))
    }
}

fn log_effect(id: RecordingId, effect: &RecordingEffect) {
    match effect {
        RecordingEffect::AttemptStarted {
            attempt_number,
            provider,
        } => tracing::info!(recording_id = %id, attempt_number, provider = %provider, "Attempt started"),
        RecordingEffect::JobAccepted { provider, job_id } => {
            tracing::info!(recording_id = %id, provider = %provider, job_id = %job_id, "Provider job accepted")
        }
        RecordingEffect::AttemptSucceeded {
            attempt_number,
            duration_ms,
        } => tracing::info!(recording_id = %id, attempt_number, duration_ms, "Attempt succeeded"),
        RecordingEffect::AttemptFailed {
            attempt_number,
            code,
        } => tracing::warn!(recording_id = %id, attempt_number, code = %code, "Attempt failed"),
        RecordingEffect::RetryScheduled { at, retry } => {
            tracing::info!(recording_id = %id, retry, next_retry_at = %at, "Retry scheduled")
        }
        RecordingEffect::MarkedFailed { code } => {
            tracing::warn!(recording_id = %id, code = %code, "Recording marked failed")
        }
        RecordingEffect::Completed => tracing::info!(recording_id = %id, "Transcription completed"),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionServiceError {
    #[error("recording not found: {0}")]
    NotFound(RecordingId),
    #[error("recording {0} is not eligible for retry")]
    NotEligible(RecordingId),
    #[error("transition: {0}")]
    Transition(#[from] TransitionError),
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
}
