use chrono::{Duration, Utc};

use scribeflow::application::ports::{RecordingRepository, RepositoryError};
use scribeflow::domain::{Failure, TranscriptionStatus};
use scribeflow::infrastructure::persistence::InMemoryRecordingRepository;

use crate::helpers::{pending_recording, zero_backoff};

#[tokio::test]
async fn given_new_recording_when_created_then_readable_by_id() {
    let repository = InMemoryRecordingRepository::new();
    let recording = pending_recording(3, Some("openai"));

    repository.create(&recording).await.unwrap();

    let stored = repository.get_by_id(recording.id).await.unwrap().unwrap();
    assert_eq!(stored, recording);
    assert_eq!(repository.len().await, 1);
}

#[tokio::test]
async fn given_duplicate_id_when_creating_then_constraint_violation() {
    let repository = InMemoryRecordingRepository::new();
    let recording = pending_recording(3, None);
    repository.create(&recording).await.unwrap();

    let err = repository.create(&recording).await.unwrap_err();

    assert!(matches!(err, RepositoryError::ConstraintViolation(_)));
}

#[tokio::test]
async fn given_matching_version_when_applying_then_written() {
    let repository = InMemoryRecordingRepository::new();
    let recording = pending_recording(3, None);
    repository.create(&recording).await.unwrap();
    let transition = recording.begin_attempt("openai", Utc::now()).unwrap();

    let applied = repository.apply(&transition).await.unwrap();

    assert!(applied);
    let stored = repository.get_by_id(recording.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TranscriptionStatus::Processing);
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn given_two_writers_from_same_snapshot_when_applying_then_second_loses() {
    let repository = InMemoryRecordingRepository::new();
    let recording = pending_recording(3, None);
    repository.create(&recording).await.unwrap();
    let first = recording.begin_attempt("openai", Utc::now()).unwrap();
    let second = recording.begin_attempt("assemblyai", Utc::now()).unwrap();

    assert!(repository.apply(&first).await.unwrap());
    assert!(!repository.apply(&second).await.unwrap());

    let stored = repository.get_by_id(recording.id).await.unwrap().unwrap();
    assert_eq!(stored.attempts.len(), 1);
    assert_eq!(stored.attempts[0].provider_name, "openai");
}

#[tokio::test]
async fn given_unknown_recording_when_applying_then_not_written() {
    let repository = InMemoryRecordingRepository::new();
    let transition = pending_recording(3, None)
        .begin_attempt("openai", Utc::now())
        .unwrap();

    assert!(!repository.apply(&transition).await.unwrap());
    assert!(repository.is_empty().await);
}

#[tokio::test]
async fn given_accepted_jobs_when_querying_then_matched_by_provider_and_job_id() {
    let repository = InMemoryRecordingRepository::new();
    let recording = pending_recording(3, None);
    repository.create(&recording).await.unwrap();
    let started = recording.begin_attempt("assemblyai", Utc::now()).unwrap();
    repository.apply(&started).await.unwrap();
    let accepted = started
        .next
        .accept_job("assemblyai", "job-1", Utc::now())
        .unwrap();
    repository.apply(&accepted).await.unwrap();

    let found = repository.find_by_job_id("assemblyai", "job-1").await.unwrap();
    let wrong_provider = repository.find_by_job_id("replicate", "job-1").await.unwrap();
    let in_flight = repository
        .find_in_flight_jobs(&["assemblyai".to_string()], 10)
        .await
        .unwrap();
    let other_in_flight = repository
        .find_in_flight_jobs(&["replicate".to_string()], 10)
        .await
        .unwrap();

    assert_eq!(found.unwrap().id, recording.id);
    assert!(wrong_provider.is_none());
    assert_eq!(in_flight.len(), 1);
    assert!(other_in_flight.is_empty());
}

#[tokio::test]
async fn given_retrying_recordings_when_querying_eligible_then_due_ones_oldest_first() {
    let repository = InMemoryRecordingRepository::new();
    let now = Utc::now();
    let mut ids = Vec::new();
    for offset in [3, 1, 2] {
        let recording = pending_recording(3, None);
        repository.create(&recording).await.unwrap();
        let started = recording.begin_attempt("openai", now).unwrap();
        repository.apply(&started).await.unwrap();
        let mut retrying = started
            .next
            .fail(&Failure::new("HTTP_503", "down", true), now, &zero_backoff())
            .unwrap();
        retrying.next.retry.next_retry_at = Some(now - Duration::minutes(offset));
        repository.apply(&retrying).await.unwrap();
        ids.push(recording.id);
    }
    let mut not_due = pending_recording(3, None);
    not_due.status = TranscriptionStatus::Retrying;
    not_due.retry.next_retry_at = Some(now + Duration::hours(1));
    repository.upsert(not_due).await;

    let eligible = repository.find_retry_eligible(now, 2).await.unwrap();

    assert_eq!(
        eligible.iter().map(|r| r.id).collect::<Vec<_>>(),
        vec![ids[0], ids[2]]
    );
}

#[tokio::test]
async fn given_processing_without_job_when_querying_stalled_then_only_old_ones_returned() {
    let repository = InMemoryRecordingRepository::new();
    let recording = pending_recording(3, None);
    repository.create(&recording).await.unwrap();
    let started = recording
        .begin_attempt("openai", Utc::now() - Duration::hours(2))
        .unwrap();
    repository.apply(&started).await.unwrap();

    let stalled = repository
        .find_stalled(Utc::now() - Duration::minutes(30), 10)
        .await
        .unwrap();
    let fresh = repository
        .find_stalled(Utc::now() - Duration::hours(3), 10)
        .await
        .unwrap();

    assert_eq!(stalled.len(), 1);
    assert!(fresh.is_empty());
}

#[tokio::test]
async fn given_old_and_fresh_pending_recordings_when_querying_stale_pending_then_only_old_returned() {
    let repository = InMemoryRecordingRepository::new();
    let mut old = pending_recording(3, None);
    old.created_at = Utc::now() - Duration::minutes(10);
    repository.create(&old).await.unwrap();
    let fresh = pending_recording(3, None);
    repository.create(&fresh).await.unwrap();
    let mut started = pending_recording(3, None);
    started.created_at = Utc::now() - Duration::minutes(10);
    repository.create(&started).await.unwrap();
    let transition = started.begin_attempt("openai", Utc::now()).unwrap();
    repository.apply(&transition).await.unwrap();

    let stale = repository
        .find_stale_pending(Utc::now() - Duration::minutes(2), 10)
        .await
        .unwrap();

    assert_eq!(stale.iter().map(|r| r.id).collect::<Vec<_>>(), vec![old.id]);
}
