use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::application::ports::{
    AudioSource, CompletionModel, PendingJob, PollOutcome, ProviderError, ProviderOutcome,
    TranscriptionOptions, TranscriptionProvider,
};
use crate::domain::{TranscriptMetadata, TranscriptionResult};

use super::replicate_provider::parse_prediction;

/// One scripted reply, consumed in order.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    Complete(String),
    Pending(String),
    StillProcessing(String),
    Fail(ProviderError),
}

/// A provider whose replies are queued up front. Used for local development and tests.
pub struct ScriptedProvider {
    name: String,
    model: CompletionModel,
    transcribe_script: Mutex<VecDeque<ScriptedStep>>,
    poll_script: Mutex<VecDeque<ScriptedStep>>,
    fallback: Option<String>,
    transcribe_calls: AtomicUsize,
    poll_calls: AtomicUsize,
    last_options: Mutex<Option<TranscriptionOptions>>,
}

impl ScriptedProvider {
    pub fn new(name: impl Into<String>, model: CompletionModel) -> Self {
        Self {
            name: name.into(),
            model,
            transcribe_script: Mutex::new(VecDeque::new()),
            poll_script: Mutex::new(VecDeque::new()),
            fallback: None,
            transcribe_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }

    /// Completes every unscripted call with `transcript`.
    pub fn echo(name: impl Into<String>, transcript: impl Into<String>) -> Self {
        let mut provider = Self::new(name, CompletionModel::Synchronous);
        provider.fallback = Some(transcript.into());
        provider
    }

    pub fn on_transcribe(self, step: ScriptedStep) -> Self {
        if let Ok(mut script) = self.transcribe_script.lock() {
            script.push_back(step);
        }
        self
    }

    pub fn on_poll(self, step: ScriptedStep) -> Self {
        if let Ok(mut script) = self.poll_script.lock() {
            script.push_back(step);
        }
        self
    }

    pub fn transcribe_calls(&self) -> usize {
        self.transcribe_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<TranscriptionOptions> {
        self.last_options.lock().ok().and_then(|o| o.clone())
    }

    fn next_step(&self, script: &Mutex<VecDeque<ScriptedStep>>) -> Option<ScriptedStep> {
        script.lock().ok().and_then(|mut s| s.pop_front())
    }

    fn result(&self, text: String, job_id: Option<String>) -> Result<TranscriptionResult, ProviderError> {
        if text.trim().is_empty() {
            return Err(ProviderError::empty_transcript());
        }
        let mut metadata = TranscriptMetadata::new(self.name.clone(), "scripted");
        metadata.job_id = job_id;
        Ok(TranscriptionResult {
            text,
            duration_seconds: None,
            metadata,
        })
    }

    fn exhausted(&self, operation: &str) -> ProviderError {
        ProviderError::unavailable(
            "SCRIPT_EXHAUSTED",
            format!("{} has no scripted {} reply", self.name, operation),
        )
    }
}

#[async_trait]
impl TranscriptionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn completion_model(&self) -> CompletionModel {
        self.model
    }

    async fn transcribe(
        &self,
        _audio: &AudioSource,
        options: &TranscriptionOptions,
    ) -> Result<ProviderOutcome, ProviderError> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_options.lock() {
            *last = Some(options.clone());
        }

        match self.next_step(&self.transcribe_script) {
            Some(ScriptedStep::Complete(text)) => self.result(text, None).map(ProviderOutcome::Completed),
            Some(ScriptedStep::Pending(job_id)) => Ok(ProviderOutcome::Pending(PendingJob { job_id })),
            Some(ScriptedStep::Fail(e)) => Err(e),
            Some(ScriptedStep::StillProcessing(_)) | None => match &self.fallback {
                Some(text) => self.result(text.clone(), None).map(ProviderOutcome::Completed),
                None => Err(self.exhausted("transcribe")),
            },
        }
    }

    async fn poll_status(&self, job_id: &str) -> Result<PollOutcome, ProviderError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if !self.model.is_pollable() {
            return Err(ProviderError::job_not_found(format!(
                "{} does not issue pollable jobs (job {})",
                self.name, job_id
            )));
        }

        match self.next_step(&self.poll_script) {
            Some(ScriptedStep::Complete(text)) => self
                .result(text, Some(job_id.to_string()))
                .map(PollOutcome::Completed),
            Some(ScriptedStep::StillProcessing(status)) => Ok(PollOutcome::StillProcessing {
                remote_status: status,
            }),
            Some(ScriptedStep::Fail(e)) => Err(e),
            Some(ScriptedStep::Pending(_)) | None => Ok(PollOutcome::StillProcessing {
                remote_status: "processing".to_string(),
            }),
        }
    }

    /// Webhook-mode scripts accept prediction-shaped payloads.
    fn parse_callback(&self, payload: &Value) -> Result<PollOutcome, ProviderError> {
        if self.model != CompletionModel::Webhook {
            return Err(ProviderError::rejected(
                "CALLBACK_UNSUPPORTED",
                format!("{} does not deliver webhooks", self.name),
            ));
        }
        match parse_prediction(payload, "scripted")? {
            PollOutcome::Completed(mut result) => {
                result.metadata.provider = self.name.clone();
                Ok(PollOutcome::Completed(result))
            }
            pending => Ok(pending),
        }
    }
}
