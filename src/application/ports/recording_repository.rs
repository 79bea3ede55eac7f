use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Recording, RecordingId, Transition};

use super::RepositoryError;

#[async_trait]
pub trait RecordingRepository: Send + Sync {
    async fn create(&self, recording: &Recording) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: RecordingId) -> Result<Option<Recording>, RepositoryError>;

    async fn find_by_job_id(
        &self,
        provider: &str,
        job_id: &str,
    ) -> Result<Option<Recording>, RepositoryError>;

    /// Recordings matching `Recording::is_retry_eligible(now)`, oldest `next_retry_at` first.
    async fn find_retry_eligible(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Recording>, RepositoryError>;

    /// `processing` recordings with an accepted job on one of `providers`.
    async fn find_in_flight_jobs(
        &self,
        providers: &[String],
        limit: usize,
    ) -> Result<Vec<Recording>, RepositoryError>;

    /// `processing` recordings without a job whose open attempt started before `started_before`.
    async fn find_stalled(
        &self,
        started_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Recording>, RepositoryError>;

    /// `pending` recordings created before `created_before` that no attempt has picked up, oldest first.
    async fn find_stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Recording>, RepositoryError>;

    /// Writes `transition.next` if the stored recording still matches the
    /// transition's expected status and version. Returns `false` otherwise.
    async fn apply(&self, transition: &Transition) -> Result<bool, RepositoryError>;
}
