use chrono::{Duration, Utc};

use scribeflow::application::ports::{
    RecordingRepository, RepositoryError, SessionLifecycle, SessionLifecycleError,
};
use scribeflow::domain::{
    AttemptOutcome, Failure, SessionId, TranscriptMetadata, TranscriptionResult,
    TranscriptionStatus,
};

use crate::helpers::test_postgres::TestPostgres;
use crate::helpers::{pending_recording, zero_backoff};

#[tokio::test]
async fn given_new_recording_when_created_then_round_trips_through_postgres() {
    let pg = TestPostgres::new().await;
    let recording = pending_recording(3, Some("assemblyai"));

    pg.recording_repository.create(&recording).await.unwrap();
    let stored = pg
        .recording_repository
        .get_by_id(recording.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(stored.id, recording.id);
    assert_eq!(stored.session_id, recording.session_id);
    assert_eq!(stored.status, TranscriptionStatus::Pending);
    assert_eq!(stored.audio.filename, "lecture.wav");
    assert_eq!(stored.audio.storage_path, recording.audio.storage_path);
    assert_eq!(stored.retry.max_retries, 3);
    assert_eq!(stored.retry.preferred_provider.as_deref(), Some("assemblyai"));
    assert_eq!(stored.version, 0);
    assert!(stored.attempts.is_empty());
}

#[tokio::test]
async fn given_duplicate_id_when_creating_then_constraint_violation() {
    let pg = TestPostgres::new().await;
    let recording = pending_recording(3, None);
    pg.recording_repository.create(&recording).await.unwrap();

    let err = pg.recording_repository.create(&recording).await.unwrap_err();

    assert!(matches!(err, RepositoryError::ConstraintViolation(_)));
}

#[tokio::test]
async fn given_stale_snapshot_when_applying_then_conditional_update_rejects_it() {
    let pg = TestPostgres::new().await;
    let recording = pending_recording(3, None);
    pg.recording_repository.create(&recording).await.unwrap();
    let first = recording.begin_attempt("openai", Utc::now()).unwrap();
    let second = recording.begin_attempt("replicate", Utc::now()).unwrap();

    assert!(pg.recording_repository.apply(&first).await.unwrap());
    assert!(!pg.recording_repository.apply(&second).await.unwrap());

    let stored = pg
        .recording_repository
        .get_by_id(recording.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.attempts.len(), 1);
    assert_eq!(stored.attempts[0].provider_name, "openai");
}

#[tokio::test]
async fn given_completed_job_when_applying_then_transcript_metadata_and_attempts_persisted() {
    let pg = TestPostgres::new().await;
    let recording = pending_recording(3, None);
    pg.recording_repository.create(&recording).await.unwrap();
    let started = recording.begin_attempt("assemblyai", Utc::now()).unwrap();
    pg.recording_repository.apply(&started).await.unwrap();
    let accepted = started
        .next
        .accept_job("assemblyai", "tx-77", Utc::now())
        .unwrap();
    pg.recording_repository.apply(&accepted).await.unwrap();

    let by_job = pg
        .recording_repository
        .find_by_job_id("assemblyai", "tx-77")
        .await
        .unwrap()
        .unwrap();
    let in_flight = pg
        .recording_repository
        .find_in_flight_jobs(&["assemblyai".to_string()], 10)
        .await
        .unwrap();
    assert_eq!(by_job.id, recording.id);
    assert_eq!(in_flight.len(), 1);

    let mut metadata = TranscriptMetadata::new("assemblyai", "best");
    metadata.confidence = Some(0.88);
    let completed = by_job
        .complete(
            TranscriptionResult {
                text: "persisted words".to_string(),
                duration_seconds: Some(9.0),
                metadata,
            },
            Utc::now(),
        )
        .unwrap();
    assert!(pg.recording_repository.apply(&completed).await.unwrap());

    let stored = pg
        .recording_repository
        .get_by_id(recording.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TranscriptionStatus::Completed);
    assert_eq!(stored.transcript.as_deref(), Some("persisted words"));
    let stored_metadata = stored.metadata.unwrap();
    assert_eq!(stored_metadata.confidence, Some(0.88));
    assert_eq!(stored_metadata.job_id.as_deref(), Some("tx-77"));
    assert_eq!(stored.attempts[0].outcome, AttemptOutcome::Success);
    assert_eq!(stored.audio.duration_seconds, Some(9.0));
    assert!(
        pg.recording_repository
            .find_in_flight_jobs(&["assemblyai".to_string()], 10)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn given_retrying_recordings_when_querying_eligible_then_only_due_rows_returned() {
    let pg = TestPostgres::new().await;
    let now = Utc::now();

    let due = pending_recording(3, None);
    pg.recording_repository.create(&due).await.unwrap();
    let started = due.begin_attempt("openai", now).unwrap();
    pg.recording_repository.apply(&started).await.unwrap();
    let retrying = started
        .next
        .fail(&Failure::new("HTTP_503", "down", true), now, &zero_backoff())
        .unwrap();
    pg.recording_repository.apply(&retrying).await.unwrap();

    let exhausted = pending_recording(1, None);
    pg.recording_repository.create(&exhausted).await.unwrap();
    let started = exhausted.begin_attempt("openai", now).unwrap();
    pg.recording_repository.apply(&started).await.unwrap();
    let failed = started
        .next
        .fail(&Failure::new("HTTP_503", "down", true), now, &zero_backoff())
        .unwrap();
    pg.recording_repository.apply(&failed).await.unwrap();

    let eligible = pg
        .recording_repository
        .find_retry_eligible(now + Duration::seconds(1), 10)
        .await
        .unwrap();

    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].id, due.id);
    assert_eq!(eligible[0].last_error.as_ref().unwrap().code, "HTTP_503");
}

#[tokio::test]
async fn given_old_attempt_without_job_when_querying_stalled_then_returned() {
    let pg = TestPostgres::new().await;
    let recording = pending_recording(3, None);
    pg.recording_repository.create(&recording).await.unwrap();
    let started = recording
        .begin_attempt("openai", Utc::now() - Duration::hours(1))
        .unwrap();
    pg.recording_repository.apply(&started).await.unwrap();

    let stalled = pg
        .recording_repository
        .find_stalled(Utc::now() - Duration::minutes(30), 10)
        .await
        .unwrap();

    assert_eq!(stalled.len(), 1);
    assert_eq!(stalled[0].id, recording.id);
}

#[tokio::test]
async fn given_known_session_when_marking_completed_then_row_updated() {
    let pg = TestPostgres::new().await;
    let session_id = SessionId::new();
    sqlx::query("INSERT INTO sessions (id) VALUES ($1)")
        .bind(session_id.as_uuid())
        .execute(&pg.pool)
        .await
        .unwrap();

    pg.session_lifecycle.mark_completed(session_id).await.unwrap();

    let status: String = sqlx::query_scalar("SELECT status FROM sessions WHERE id = $1")
        .bind(session_id.as_uuid())
        .fetch_one(&pg.pool)
        .await
        .unwrap();
    assert_eq!(status, "completed");
}

#[tokio::test]
async fn given_unknown_session_when_marking_completed_then_not_found() {
    let pg = TestPostgres::new().await;

    let err = pg
        .session_lifecycle
        .mark_completed(SessionId::new())
        .await
        .unwrap_err();

    assert!(matches!(err, SessionLifecycleError::NotFound(_)));
}

#[tokio::test]
async fn given_pending_recording_older_than_cutoff_when_querying_stale_pending_then_returned() {
    let pg = TestPostgres::new().await;
    let mut old = pending_recording(3, None);
    old.created_at = Utc::now() - Duration::minutes(10);
    pg.recording_repository.create(&old).await.unwrap();
    let fresh = pending_recording(3, None);
    pg.recording_repository.create(&fresh).await.unwrap();

    let stale = pg
        .recording_repository
        .find_stale_pending(Utc::now() - Duration::minutes(2), 10)
        .await
        .unwrap();

    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].id, old.id);
}
