use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{FieldCipher, RecordingRepository, RepositoryError};
use crate::domain::{
    Attempt, AudioDescriptor, ErrorSnapshot, ProviderJob, Recording, RecordingId, RetryPolicy,
    SessionId, StoragePath, TranscriptMetadata, TranscriptionStatus, Transition, UserId,
};

const SELECT_COLUMNS: &str = r#"
    SELECT id, session_id, user_id, storage_path, filename, audio_format, size_bytes,
           duration_seconds, language, status, transcript, metadata, provider_name, job_id,
           job_submitted_at, attempts, max_retries, current_retry, next_retry_at,
           backoff_multiplier, preferred_provider, fallback_enabled, last_error, version,
           created_at, updated_at
    FROM recordings
"#;

pub struct PgRecordingRepository {
    pool: PgPool,
    cipher: Arc<dyn FieldCipher>,
}

impl PgRecordingRepository {
    pub fn new(pool: PgPool, cipher: Arc<dyn FieldCipher>) -> Self {
        Self { pool, cipher }
    }

    async fn hydrate(&self, row: RecordingRow) -> Result<Recording, RepositoryError> {
        let transcript = match row.transcript.as_deref() {
            Some(ciphertext) => Some(
                self.cipher
                    .decrypt(ciphertext)
                    .await
                    .map_err(|e| RepositoryError::Encoding(e.to_string()))?,
            ),
            None => None,
        };
        row.into_recording(transcript)
    }

    async fn hydrate_all(&self, rows: Vec<RecordingRow>) -> Result<Vec<Recording>, RepositoryError> {
        let mut recordings = Vec::with_capacity(rows.len());
        for row in rows {
            recordings.push(self.hydrate(row).await?);
        }
        Ok(recordings)
    }

    async fn encrypted_transcript(&self, recording: &Recording) -> Result<Option<String>, RepositoryError> {
        match recording.transcript.as_deref() {
            Some(plain) => Ok(Some(
                self.cipher
                    .encrypt(plain)
                    .await
                    .map_err(|e| RepositoryError::Encoding(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }
}

#[derive(FromRow)]
struct RecordingRow {
    id: Uuid,
    session_id: Uuid,
    user_id: Uuid,
    storage_path: Option<String>,
    filename: String,
    audio_format: String,
    size_bytes: i64,
    duration_seconds: Option<f64>,
    language: Option<String>,
    status: String,
    transcript: Option<String>,
    metadata: Option<Json<TranscriptMetadata>>,
    provider_name: Option<String>,
    job_id: Option<String>,
    job_submitted_at: Option<DateTime<Utc>>,
    attempts: Json<Vec<Attempt>>,
    max_retries: i32,
    current_retry: i32,
    next_retry_at: Option<DateTime<Utc>>,
    backoff_multiplier: f64,
    preferred_provider: Option<String>,
    fallback_enabled: bool,
    last_error: Option<Json<ErrorSnapshot>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecordingRow {
    fn into_recording(self, transcript: Option<String>) -> Result<Recording, RepositoryError> {
        let status = self
            .status
            .parse::<TranscriptionStatus>()
            .map_err(RepositoryError::QueryFailed)?;

        let provider_job = match (self.provider_name, self.job_id, self.job_submitted_at) {
            (Some(provider), Some(job_id), Some(submitted_at)) => Some(ProviderJob {
                provider,
                job_id,
                submitted_at,
            }),
            _ => None,
        };

        Ok(Recording {
            id: RecordingId::from_uuid(self.id),
            session_id: SessionId::from_uuid(self.session_id),
            user_id: UserId::from_uuid(self.user_id),
            audio: AudioDescriptor {
                storage_path: self.storage_path.map(StoragePath::from_raw),
                filename: self.filename,
                format: self.audio_format,
                size_bytes: self.size_bytes.max(0) as u64,
                duration_seconds: self.duration_seconds,
                language: self.language,
            },
            status,
            transcript,
            metadata: self.metadata.map(|m| m.0),
            provider_job,
            attempts: self.attempts.0,
            retry: RetryPolicy {
                max_retries: self.max_retries.max(0) as u32,
                current_retry: self.current_retry.max(0) as u32,
                next_retry_at: self.next_retry_at,
                backoff_multiplier: self.backoff_multiplier,
                preferred_provider: self.preferred_provider,
                fallback_enabled: self.fallback_enabled,
            },
            last_error: self.last_error.map(|e| e.0),
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn query_failed(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() || db.is_check_violation() => {
            RepositoryError::ConstraintViolation(db.to_string())
        }
        other => RepositoryError::QueryFailed(other.to_string()),
    }
}

#[async_trait]
impl RecordingRepository for PgRecordingRepository {
    #[instrument(skip(self, recording), fields(recording_id = %recording.id))]
    async fn create(&self, recording: &Recording) -> Result<(), RepositoryError> {
        let transcript = self.encrypted_transcript(recording).await?;
        let job = recording.provider_job.as_ref();

        sqlx::query(
            r#"
            INSERT INTO recordings (
                id, session_id, user_id, storage_path, filename, audio_format, size_bytes,
                duration_seconds, language, status, transcript, metadata, provider_name, job_id,
                job_submitted_at, attempts, max_retries, current_retry, next_retry_at,
                backoff_multiplier, preferred_provider, fallback_enabled, last_error, version,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)
            "#,
        )
        .bind(recording.id.as_uuid())
        .bind(recording.session_id.as_uuid())
        .bind(recording.user_id.as_uuid())
        .bind(recording.audio.storage_path.as_ref().map(|p| p.as_str().to_string()))
        .bind(&recording.audio.filename)
        .bind(&recording.audio.format)
        .bind(recording.audio.size_bytes as i64)
        .bind(recording.audio.duration_seconds)
        .bind(&recording.audio.language)
        .bind(recording.status.as_str())
        .bind(transcript)
        .bind(recording.metadata.as_ref().map(Json))
        .bind(job.map(|j| j.provider.clone()))
        .bind(job.map(|j| j.job_id.clone()))
        .bind(job.map(|j| j.submitted_at))
        .bind(Json(&recording.attempts))
        .bind(recording.retry.max_retries as i32)
        .bind(recording.retry.current_retry as i32)
        .bind(recording.retry.next_retry_at)
        .bind(recording.retry.backoff_multiplier)
        .bind(&recording.retry.preferred_provider)
        .bind(recording.retry.fallback_enabled)
        .bind(recording.last_error.as_ref().map(Json))
        .bind(recording.version)
        .bind(recording.created_at)
        .bind(recording.updated_at)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(())
    }

    #[instrument(skip(self), fields(recording_id = %id))]
    async fn get_by_id(&self, id: RecordingId) -> Result<Option<Recording>, RepositoryError> {
        let row = sqlx::query_as::<_, RecordingRow>(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn find_by_job_id(
        &self,
        provider: &str,
        job_id: &str,
    ) -> Result<Option<Recording>, RepositoryError> {
        let row = sqlx::query_as::<_, RecordingRow>(&format!(
            "{} WHERE provider_name = $1 AND job_id = $2 ORDER BY updated_at DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(provider)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn find_retry_eligible(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Recording>, RepositoryError> {
        let rows = sqlx::query_as::<_, RecordingRow>(&format!(
            r#"{}
            WHERE status IN ('failed', 'retrying')
              AND fallback_enabled
              AND current_retry < max_retries
              AND next_retry_at IS NOT NULL
              AND next_retry_at <= $1
            ORDER BY next_retry_at ASC
            LIMIT $2"#,
            SELECT_COLUMNS
        ))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        self.hydrate_all(rows).await
    }

    #[instrument(skip(self))]
    async fn find_in_flight_jobs(
        &self,
        providers: &[String],
        limit: usize,
    ) -> Result<Vec<Recording>, RepositoryError> {
        let rows = sqlx::query_as::<_, RecordingRow>(&format!(
            r#"{}
            WHERE status = 'processing'
              AND job_id IS NOT NULL
              AND provider_name = ANY($1)
            ORDER BY job_submitted_at ASC
            LIMIT $2"#,
            SELECT_COLUMNS
        ))
        .bind(providers)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        self.hydrate_all(rows).await
    }

    #[instrument(skip(self))]
    async fn find_stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Recording>, RepositoryError> {
        let rows = sqlx::query_as::<_, RecordingRow>(&format!(
            r#"{}
            WHERE status = 'pending'
              AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2"#,
            SELECT_COLUMNS
        ))
        .bind(created_before)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        self.hydrate_all(rows).await
    }

    #[instrument(skip(self))]
    async fn find_stalled(
        &self,
        started_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Recording>, RepositoryError> {
        // updated_at is the attempt start for a processing row without a job.
        let rows = sqlx::query_as::<_, RecordingRow>(&format!(
            r#"{}
            WHERE status = 'processing'
              AND job_id IS NULL
              AND updated_at < $1
            ORDER BY updated_at ASC
            LIMIT $2"#,
            SELECT_COLUMNS
        ))
        .bind(started_before)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        self.hydrate_all(rows).await
    }

    #[instrument(
        skip(self, transition),
        fields(
            recording_id = %transition.next.id,
            expected_version = transition.expected_version,
            next_status = %transition.next.status
        )
    )]
    async fn apply(&self, transition: &Transition) -> Result<bool, RepositoryError> {
        let next = &transition.next;
        let transcript = self.encrypted_transcript(next).await?;
        let job = next.provider_job.as_ref();

        let result = sqlx::query(
            r#"
            UPDATE recordings
            SET storage_path = $4,
                duration_seconds = $5,
                status = $6,
                transcript = $7,
                metadata = $8,
                provider_name = $9,
                job_id = $10,
                job_submitted_at = $11,
                attempts = $12,
                current_retry = $13,
                next_retry_at = $14,
                last_error = $15,
                version = $16,
                updated_at = $17
            WHERE id = $1 AND version = $2 AND status = $3
            "#,
        )
        .bind(next.id.as_uuid())
        .bind(transition.expected_version)
        .bind(transition.expected_status.as_str())
        .bind(next.audio.storage_path.as_ref().map(|p| p.as_str().to_string()))
        .bind(next.audio.duration_seconds)
        .bind(next.status.as_str())
        .bind(transcript)
        .bind(next.metadata.as_ref().map(Json))
        .bind(job.map(|j| j.provider.clone()))
        .bind(job.map(|j| j.job_id.clone()))
        .bind(job.map(|j| j.submitted_at))
        .bind(Json(&next.attempts))
        .bind(next.retry.current_retry as i32)
        .bind(next.retry.next_retry_at)
        .bind(next.last_error.as_ref().map(Json))
        .bind(next.version)
        .bind(next.updated_at)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        Ok(result.rows_affected() == 1)
    }
}
