use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;

use crate::application::ports::{
    AudioSource, PollOutcome, ProviderError, ProviderOutcome, StagingStore, StagingStoreError,
    TranscriptionOptions, TranscriptionProvider,
};
use crate::domain::{
    Attempt, AudioDescriptor, BackoffPolicy, ErrorSnapshot, Recording, RecordingId, RetryPolicy,
    SessionId, StoragePath, TranscriptionResult, TranscriptionStatus, UserId,
};

use super::ProviderRegistry;

#[derive(Debug, Clone)]
pub struct ProviderTestRequest {
    pub provider: String,
    pub filename: String,
    pub data: Vec<u8>,
    pub language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PollBounds {
    pub max_polls: u32,
    pub interval: Duration,
}

impl Default for PollBounds {
    fn default() -> Self {
        Self {
            max_polls: 60,
            interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderErrorView {
    pub kind: String,
    pub code: String,
    pub message: String,
    pub recoverable: bool,
}

impl From<&ProviderError> for ProviderErrorView {
    fn from(e: &ProviderError) -> Self {
        Self {
            kind: e.kind.to_string(),
            code: e.code.clone(),
            message: e.message.clone(),
            recoverable: e.recoverable,
        }
    }
}

/// What the recording would have looked like had this run been persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingPreview {
    pub id: String,
    pub status: TranscriptionStatus,
    pub attempts: Vec<Attempt>,
    pub last_error: Option<ErrorSnapshot>,
    pub max_retries: u32,
    pub fallback_enabled: bool,
    pub transcript_chars: usize,
}

impl From<&Recording> for RecordingPreview {
    fn from(r: &Recording) -> Self {
        Self {
            id: r.id.as_uuid().to_string(),
            status: r.status,
            attempts: r.attempts.clone(),
            last_error: r.last_error.clone(),
            max_retries: r.retry.max_retries,
            fallback_enabled: r.retry.fallback_enabled,
            transcript_chars: r.transcript.as_deref().map(str::len).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTestReport {
    pub provider: String,
    pub completion_model: &'static str,
    pub success: bool,
    pub job_id: Option<String>,
    pub polls: u32,
    pub elapsed_ms: u64,
    pub result: Option<TranscriptionResult>,
    pub error: Option<ProviderErrorView>,
    pub preview: RecordingPreview,
}

/// Runs one provider against ad-hoc audio without touching persistence.
pub struct ProviderTestHarness {
    providers: Arc<ProviderRegistry>,
    staging_store: Arc<dyn StagingStore>,
    bounds: PollBounds,
}

impl ProviderTestHarness {
    pub fn new(
        providers: Arc<ProviderRegistry>,
        staging_store: Arc<dyn StagingStore>,
        bounds: PollBounds,
    ) -> Self {
        Self {
            providers,
            staging_store,
            bounds,
        }
    }

    #[tracing::instrument(skip_all, fields(provider = %request.provider, bytes = request.data.len()))]
    pub async fn run(
        &self,
        request: ProviderTestRequest,
    ) -> Result<ProviderTestReport, ProviderTestError> {
        if request.data.is_empty() {
            return Err(ProviderTestError::EmptyAudio);
        }
        let provider = self
            .providers
            .resolve(Some(&request.provider))
            .map_err(|_| ProviderTestError::UnknownProvider(request.provider.clone()))?;

        let trial_id = RecordingId::new();
        let path = StoragePath::for_provider_test(&trial_id, &request.filename);
        let size = request.data.len() as u64;
        let payload = Bytes::from(request.data);
        let stream = futures::stream::once(async move { Ok(payload) }).boxed();
        self.staging_store.store(&path, stream, Some(size)).await?;
        let staged = StagedAudio::new(Arc::clone(&self.staging_store), path.clone());

        let report = self
            .run_staged(provider.as_ref(), trial_id, &path, &request.filename, size, request.language)
            .await;

        staged.delete().await;
        report
    }

    async fn run_staged(
        &self,
        provider: &dyn TranscriptionProvider,
        trial_id: RecordingId,
        path: &StoragePath,
        filename: &str,
        size: u64,
        language: Option<String>,
    ) -> Result<ProviderTestReport, ProviderTestError> {
        let started = Instant::now();
        let format = filename.rsplit('.').next().unwrap_or_default().to_lowercase();
        let audio = AudioDescriptor::new(path.clone(), filename, format, size)
            .with_language(language.clone());

        let preview = Recording::with_id(
            trial_id,
            SessionId::new(),
            UserId::new(),
            audio,
            RetryPolicy::single_shot(provider.name()),
        );
        let mut preview = preview.begin_attempt(provider.name(), Utc::now())?.next;

        let source = AudioSource {
            data: self.staging_store.fetch(path).await?,
            filename: preview.audio.filename.clone(),
            content_type: preview.audio.content_type(),
            url: self.staging_store.reachable_url(path).await.ok().flatten(),
        };
        let options = TranscriptionOptions {
            language,
            speaker_labels: true,
            correlation_id: Some(trial_id.as_uuid().to_string()),
            webhook_url: None,
        };

        let mut job_id = None;
        let mut polls = 0;
        let outcome = match provider.transcribe(&source, &options).await {
            Ok(ProviderOutcome::Completed(result)) => Ok(result),
            Ok(ProviderOutcome::Pending(job)) => {
                preview = preview.accept_job(provider.name(), &job.job_id, Utc::now())?.next;
                job_id = Some(job.job_id.clone());
                self.poll_until_done(provider, &job.job_id, &mut polls).await
            }
            Err(e) => Err(e),
        };

        let (result, error) = match outcome {
            Ok(result) => match preview.complete(result.clone(), Utc::now()) {
                Ok(t) => {
                    preview = t.next;
                    (Some(result), None)
                }
                Err(_) => {
                    let e = ProviderError::empty_transcript();
                    preview = preview
                        .fail(&e.to_failure(), Utc::now(), &BackoffPolicy::default())?
                        .next;
                    (Some(result), Some(e))
                }
            },
            Err(e) => {
                preview = preview
                    .fail(&e.to_failure(), Utc::now(), &BackoffPolicy::default())?
                    .next;
                (None, Some(e))
            }
        };

        tracing::info!(
            success = error.is_none(),
            polls,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Provider test finished"
        );

        Ok(ProviderTestReport {
            provider: provider.name().to_string(),
            completion_model: provider.completion_model().as_str(),
            success: error.is_none(),
            job_id,
            polls,
            elapsed_ms: started.elapsed().as_millis() as u64,
            result,
            error: error.as_ref().map(ProviderErrorView::from),
            preview: RecordingPreview::from(&preview),
        })
    }

    async fn poll_until_done(
        &self,
        provider: &dyn TranscriptionProvider,
        job_id: &str,
        polls: &mut u32,
    ) -> Result<TranscriptionResult, ProviderError> {
        while *polls < self.bounds.max_polls {
            tokio::time::sleep(self.bounds.interval).await;
            *polls += 1;
            match provider.poll_status(job_id).await? {
                PollOutcome::Completed(result) => return Ok(result),
                PollOutcome::StillProcessing { remote_status } => {
                    tracing::debug!(poll = *polls, remote_status = %remote_status, "Job still running");
                }
            }
        }
        Err(ProviderError::unavailable(
            "POLL_TIMEOUT",
            format!("job {} did not finish after {} polls", job_id, polls),
        ))
    }
}

/// Deletes the staged test audio. If the run is dropped before reaching
/// `delete`, e.g. when the client disconnects mid-poll, the delete is spawned
/// onto the runtime instead.
struct StagedAudio {
    store: Arc<dyn StagingStore>,
    path: StoragePath,
    pending: bool,
}

impl StagedAudio {
    fn new(store: Arc<dyn StagingStore>, path: StoragePath) -> Self {
        Self {
            store,
            path,
            pending: true,
        }
    }

    async fn delete(mut self) {
        self.pending = false;
        remove_staged(self.store.as_ref(), &self.path).await;
    }
}

impl Drop for StagedAudio {
    fn drop(&mut self) {
        if !self.pending {
            return;
        }
        let store = Arc::clone(&self.store);
        let path = self.path.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::info!(path = %path, "Provider test abandoned, deleting staged audio");
                runtime.spawn(async move { remove_staged(store.as_ref(), &path).await });
            }
            Err(_) => {
                tracing::warn!(path = %path, "No runtime to delete abandoned provider test audio");
            }
        }
    }
}

async fn remove_staged(store: &dyn StagingStore, path: &StoragePath) {
    if let Err(e) = store.delete(path).await {
        tracing::warn!(error = %e, path = %path, "Failed to delete provider test audio");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderTestError {
    #[error("no audio supplied")]
    EmptyAudio,
    #[error("provider '{0}' is not configured")]
    UnknownProvider(String),
    #[error("staging store: {0}")]
    Staging(#[from] StagingStoreError),
    #[error("transition: {0}")]
    Transition(#[from] crate::domain::TransitionError),
}
