use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::application::ports::{RecordingRepository, RepositoryError};
use crate::domain::{Recording, RecordingId, TranscriptionStatus, Transition};

/// Process-local recording store with the same conditional-write semantics as Postgres.
#[derive(Default)]
pub struct InMemoryRecordingRepository {
    recordings: RwLock<HashMap<RecordingId, Recording>>,
}

impl InMemoryRecordingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites unconditionally. For seeding state in development and tests.
    pub async fn upsert(&self, recording: Recording) {
        self.recordings.write().await.insert(recording.id, recording);
    }

    pub async fn len(&self) -> usize {
        self.recordings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.recordings.read().await.is_empty()
    }
}

#[async_trait]
impl RecordingRepository for InMemoryRecordingRepository {
    async fn create(&self, recording: &Recording) -> Result<(), RepositoryError> {
        let mut recordings = self.recordings.write().await;
        if recordings.contains_key(&recording.id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "recording {} already exists",
                recording.id
            )));
        }
        recordings.insert(recording.id, recording.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: RecordingId) -> Result<Option<Recording>, RepositoryError> {
        Ok(self.recordings.read().await.get(&id).cloned())
    }

    async fn find_by_job_id(
        &self,
        provider: &str,
        job_id: &str,
    ) -> Result<Option<Recording>, RepositoryError> {
        Ok(self
            .recordings
            .read()
            .await
            .values()
            .filter(|r| {
                r.provider_job
                    .as_ref()
                    .is_some_and(|j| j.provider == provider && j.job_id == job_id)
            })
            .max_by_key(|r| r.updated_at)
            .cloned())
    }

    async fn find_retry_eligible(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Recording>, RepositoryError> {
        let mut eligible: Vec<Recording> = self
            .recordings
            .read()
            .await
            .values()
            .filter(|r| r.is_retry_eligible(now))
            .cloned()
            .collect();
        eligible.sort_by_key(|r| r.retry.next_retry_at);
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn find_in_flight_jobs(
        &self,
        providers: &[String],
        limit: usize,
    ) -> Result<Vec<Recording>, RepositoryError> {
        let mut in_flight: Vec<Recording> = self
            .recordings
            .read()
            .await
            .values()
            .filter(|r| {
                r.status == TranscriptionStatus::Processing
                    && r.provider_job
                        .as_ref()
                        .is_some_and(|j| providers.contains(&j.provider))
            })
            .cloned()
            .collect();
        in_flight.sort_by_key(|r| r.provider_job.as_ref().map(|j| j.submitted_at));
        in_flight.truncate(limit);
        Ok(in_flight)
    }

    async fn find_stalled(
        &self,
        started_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Recording>, RepositoryError> {
        let mut stalled: Vec<Recording> = self
            .recordings
            .read()
            .await
            .values()
            .filter(|r| {
                r.status == TranscriptionStatus::Processing
                    && r.provider_job.is_none()
                    && r.updated_at < started_before
            })
            .cloned()
            .collect();
        stalled.sort_by_key(|r| r.updated_at);
        stalled.truncate(limit);
        Ok(stalled)
    }

    async fn find_stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Recording>, RepositoryError> {
        let mut pending: Vec<Recording> = self
            .recordings
            .read()
            .await
            .values()
            .filter(|r| r.status == TranscriptionStatus::Pending && r.created_at < created_before)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn apply(&self, transition: &Transition) -> Result<bool, RepositoryError> {
        let mut recordings = self.recordings.write().await;
        let Some(current) = recordings.get_mut(&transition.next.id) else {
            return Ok(false);
        };

        if current.version != transition.expected_version
            || current.status != transition.expected_status
        {
            return Ok(false);
        }

        *current = transition.next.clone();
        Ok(true)
    }
}
