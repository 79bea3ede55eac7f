use chrono::{DateTime, Utc};

use super::error_snapshot::RETRY_BUDGET_EXHAUSTED;
use super::transition::{RecordingEffect, Transition, TransitionError};
use super::{
    Attempt, AttemptOutcome, AudioDescriptor, BackoffPolicy, ErrorSnapshot, Failure, RecordingId,
    RetryPolicy, SessionId, TranscriptMetadata, TranscriptionResult, TranscriptionStatus, UserId,
};

/// A provider job that has been accepted but not yet resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderJob {
    pub provider: String,
    pub job_id: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub id: RecordingId,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub audio: AudioDescriptor,
    pub status: TranscriptionStatus,
    pub transcript: Option<String>,
    pub metadata: Option<TranscriptMetadata>,
    pub provider_job: Option<ProviderJob>,
    pub attempts: Vec<Attempt>,
    pub retry: RetryPolicy,
    pub last_error: Option<ErrorSnapshot>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recording {
    pub fn new(
        session_id: SessionId,
        user_id: UserId,
        audio: AudioDescriptor,
        retry: RetryPolicy,
    ) -> Self {
        Self::with_id(RecordingId::new(), session_id, user_id, audio, retry)
    }

    pub fn with_id(
        id: RecordingId,
        session_id: SessionId,
        user_id: UserId,
        audio: AudioDescriptor,
        retry: RetryPolicy,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            session_id,
            user_id,
            audio,
            status: TranscriptionStatus::Pending,
            transcript: None,
            metadata: None,
            provider_job: None,
            attempts: Vec::new(),
            retry,
            last_error: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn last_attempt(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    pub fn last_provider(&self) -> Option<&str> {
        self.attempts.last().map(|a| a.provider_name.as_str())
    }

    /// The single retry-eligibility predicate. Persistence queries mirror it.
    pub fn is_retry_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status.is_failure()
            && self.retry.fallback_enabled
            && self.retry.current_retry < self.retry.max_retries
            && self.retry.next_retry_at.is_some_and(|at| at <= now)
    }

    /// pending|retrying -> processing. Appends a fresh `attempting` entry.
    pub fn begin_attempt(
        &self,
        provider: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        let allowed = match self.status {
            TranscriptionStatus::Pending => true,
            TranscriptionStatus::Retrying | TranscriptionStatus::Failed => {
                self.is_retry_eligible(now)
            }
            _ => false,
        };
        if !allowed {
            return Err(TransitionError::InvalidState {
                action: "begin an attempt on",
                status: self.status,
            });
        }

        let mut next = self.clone();
        let mut effects = Vec::new();

        // An attempt left open by a crash is closed before a new one is appended.
        if let Some(orphan) = next.attempts.last_mut().filter(|a| a.is_open()) {
            orphan.finish(
                AttemptOutcome::Failed,
                Some("attempt interrupted before completion".to_string()),
                now,
            );
            effects.push(RecordingEffect::AttemptFailed {
                attempt_number: orphan.attempt_number,
                code: "ATTEMPT_INTERRUPTED".to_string(),
            });
        }

        let attempt_number = next.attempts.len() as u32 + 1;
        next.attempts.push(Attempt::start(attempt_number, provider, now));
        next.status = TranscriptionStatus::Processing;
        next.provider_job = None;

        effects.push(RecordingEffect::AttemptStarted {
            attempt_number,
            provider: provider.to_string(),
        });

        Ok(self.transition_to(next, effects, now))
    }

    /// Records the job id returned by a job-based provider. Status stays `processing`.
    pub fn accept_job(
        &self,
        provider: &str,
        job_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        self.require_processing("accept a job for")?;

        let mut next = self.clone();
        let attempt = next
            .attempts
            .last_mut()
            .filter(|a| a.is_open())
            .ok_or(TransitionError::NoOpenAttempt)?;
        attempt.job_id = Some(job_id.to_string());

        next.provider_job = Some(ProviderJob {
            provider: provider.to_string(),
            job_id: job_id.to_string(),
            submitted_at: now,
        });

        let effects = vec![RecordingEffect::JobAccepted {
            provider: provider.to_string(),
            job_id: job_id.to_string(),
        }];

        Ok(self.transition_to(next, effects, now))
    }

    /// processing -> completed.
    pub fn complete(
        &self,
        result: TranscriptionResult,
        now: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        self.require_processing("complete")?;

        let text = result.text.trim();
        if text.is_empty() {
            return Err(TransitionError::EmptyTranscript);
        }

        let mut next = self.clone();
        let mut effects = Vec::new();

        let mut metadata = result.metadata;
        if metadata.job_id.is_none() {
            metadata.job_id = self.provider_job.as_ref().map(|j| j.job_id.clone());
        }

        if let Some(attempt) = next.attempts.last_mut().filter(|a| a.is_open()) {
            attempt.finish(AttemptOutcome::Success, None, now);
            if attempt.job_id.is_none() {
                attempt.job_id = metadata.job_id.clone();
            }
            effects.push(RecordingEffect::AttemptSucceeded {
                attempt_number: attempt.attempt_number,
                duration_ms: attempt.duration_ms.unwrap_or_default(),
            });
        }

        if next.audio.duration_seconds.is_none() {
            next.audio.duration_seconds = result.duration_seconds;
        }
        next.status = TranscriptionStatus::Completed;
        next.transcript = Some(text.to_string());
        next.metadata = Some(metadata);
        next.last_error = None;
        next.retry.next_retry_at = None;
        effects.push(RecordingEffect::Completed);

        Ok(self.transition_to(next, effects, now))
    }

    /// processing -> retrying | failed.
    ///
    /// The retry decision reads the pre-transition retry state; the resulting
    /// writes are applied together in the returned transition.
    pub fn fail(
        &self,
        failure: &Failure,
        now: DateTime<Utc>,
        backoff: &BackoffPolicy,
    ) -> Result<Transition, TransitionError> {
        self.require_processing("fail")?;

        let will_retry =
            failure.recoverable && self.retry.fallback_enabled && self.retry.has_budget();

        let mut next = self.clone();
        let mut effects = Vec::new();

        let (attempt_number, provider_name) = match next.attempts.last_mut() {
            Some(attempt) => {
                if attempt.is_open() {
                    attempt.finish(AttemptOutcome::Failed, Some(failure.message.clone()), now);
                    effects.push(RecordingEffect::AttemptFailed {
                        attempt_number: attempt.attempt_number,
                        code: failure.code.clone(),
                    });
                }
                (attempt.attempt_number, attempt.provider_name.clone())
            }
            None => (0, String::new()),
        };

        let mut snapshot = ErrorSnapshot {
            message: failure.message.clone(),
            code: failure.code.clone(),
            timestamp: now,
            attempt_number,
            provider_name,
            is_recoverable: failure.recoverable,
        };

        if will_retry {
            let delay = backoff.delay_for(self.retry.current_retry, self.retry.backoff_multiplier);
            next.retry.current_retry = self.retry.current_retry + 1;

            if next.retry.current_retry >= next.retry.max_retries {
                next.status = TranscriptionStatus::Failed;
                next.retry.next_retry_at = None;
                snapshot.code = RETRY_BUDGET_EXHAUSTED.to_string();
                snapshot.message = format!(
                    "retry budget exhausted after {} attempts: {}",
                    next.attempts.len(),
                    failure.message
                );
                snapshot.is_recoverable = false;
                effects.push(RecordingEffect::MarkedFailed {
                    code: snapshot.code.clone(),
                });
            } else {
                let at = now + chrono::Duration::milliseconds(delay.as_millis() as i64);
                next.status = TranscriptionStatus::Retrying;
                next.retry.next_retry_at = Some(at);
                effects.push(RecordingEffect::RetryScheduled {
                    at,
                    retry: next.retry.current_retry,
                });
            }
        } else {
            next.status = TranscriptionStatus::Failed;
            next.retry.next_retry_at = None;
            effects.push(RecordingEffect::MarkedFailed {
                code: snapshot.code.clone(),
            });
        }

        next.last_error = Some(snapshot);

        Ok(self.transition_to(next, effects, now))
    }

    /// Lists broken invariants; empty for a consistent recording.
    pub fn invariant_violations(&self) -> Vec<&'static str> {
        let mut violations = Vec::new();

        if self.retry.current_retry > self.retry.max_retries {
            violations.push("current_retry exceeds max_retries");
        }
        if self.retry.current_retry >= self.retry.max_retries && self.retry.next_retry_at.is_some()
        {
            violations.push("next_retry_at set with exhausted budget");
        }
        let open = self.attempts.iter().filter(|a| a.is_open()).count();
        if open > 1 {
            violations.push("more than one open attempt");
        }
        if open == 1 && !self.attempts.last().is_some_and(|a| a.is_open()) {
            violations.push("open attempt is not the most recent");
        }
        if self.status == TranscriptionStatus::Completed {
            if self.transcript.as_deref().is_none_or(|t| t.trim().is_empty()) {
                violations.push("completed without transcript");
            }
            if self.last_error.is_some() {
                violations.push("completed with error snapshot");
            }
        }
        if self.status.is_failure() && self.last_error.is_none() {
            violations.push("failure status without error snapshot");
        }

        violations
    }

    fn require_processing(&self, action: &'static str) -> Result<(), TransitionError> {
        if self.status == TranscriptionStatus::Processing {
            Ok(())
        } else {
            Err(TransitionError::InvalidState {
                action,
                status: self.status,
            })
        }
    }

    fn transition_to(
        &self,
        mut next: Recording,
        effects: Vec<RecordingEffect>,
        now: DateTime<Utc>,
    ) -> Transition {
        next.version = self.version + 1;
        next.updated_at = now;
        Transition {
            expected_status: self.status,
            expected_version: self.version,
            next,
            effects,
        }
    }
}
