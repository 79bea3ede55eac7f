#![allow(dead_code)]

pub mod test_postgres;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use scribeflow::application::ports::{
    NoteGenerator, NoteGeneratorError, SessionLifecycle, SessionLifecycleError, StagingStore,
};
use scribeflow::application::services::{
    CompletionTrigger, ProviderRegistry, TranscriptionService,
};
use scribeflow::domain::{
    AudioDescriptor, BackoffPolicy, Recording, RecordingId, RetryPolicy, SessionId, StoragePath,
    UserId,
};
use scribeflow::infrastructure::notification::BroadcastNotifier;
use scribeflow::infrastructure::persistence::InMemoryRecordingRepository;
use scribeflow::infrastructure::storage::ObjectStagingStore;

pub const TEST_AUDIO: &[u8] = b"RIFF fake wav bytes";

/// Retries become due immediately.
pub fn zero_backoff() -> BackoffPolicy {
    BackoffPolicy::new(Duration::ZERO, Duration::ZERO)
}

pub fn audio_for(recording_id: &RecordingId) -> AudioDescriptor {
    AudioDescriptor::new(
        StoragePath::for_recording(recording_id, "lecture.wav"),
        "lecture.wav",
        "wav",
        TEST_AUDIO.len() as u64,
    )
}

pub fn pending_recording(max_retries: u32, preferred_provider: Option<&str>) -> Recording {
    let id = RecordingId::new();
    Recording::with_id(
        id,
        SessionId::new(),
        UserId::new(),
        audio_for(&id),
        RetryPolicy::new(max_retries, 2.0, preferred_provider.map(str::to_string)),
    )
}

pub async fn stage(store: &dyn StagingStore, path: &StoragePath, data: &'static [u8]) {
    let stream = futures::stream::once(async move { Ok(Bytes::from_static(data)) }).boxed();
    store
        .store(path, stream, Some(data.len() as u64))
        .await
        .expect("Failed to stage audio");
}

#[derive(Default)]
pub struct RecordingSessions {
    pub completed: Mutex<Vec<SessionId>>,
}

impl RecordingSessions {
    pub fn completed(&self) -> Vec<SessionId> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionLifecycle for RecordingSessions {
    async fn mark_completed(&self, session_id: SessionId) -> Result<(), SessionLifecycleError> {
        self.completed.lock().unwrap().push(session_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotes {
    pub requests: Mutex<Vec<(SessionId, RecordingId)>>,
    pub fail: bool,
}

impl RecordingNotes {
    pub fn failing() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn requests(&self) -> Vec<(SessionId, RecordingId)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl NoteGenerator for RecordingNotes {
    async fn request_session_summary(
        &self,
        session_id: SessionId,
        recording_id: RecordingId,
    ) -> Result<(), NoteGeneratorError> {
        self.requests.lock().unwrap().push((session_id, recording_id));
        if self.fail {
            return Err(NoteGeneratorError::Rejected("status 503: down".to_string()));
        }
        Ok(())
    }
}

/// A transcription engine wired to in-memory collaborators.
pub struct TestEngine {
    pub repository: Arc<InMemoryRecordingRepository>,
    pub store: Arc<ObjectStagingStore>,
    pub notifier: Arc<BroadcastNotifier>,
    pub sessions: Arc<RecordingSessions>,
    pub notes: Arc<RecordingNotes>,
    pub providers: Arc<ProviderRegistry>,
    pub service: Arc<TranscriptionService>,
}

impl TestEngine {
    pub fn new(providers: ProviderRegistry) -> Self {
        Self::build(providers, None, RecordingNotes::default())
    }

    pub fn with_public_base_url(providers: ProviderRegistry, base_url: &str) -> Self {
        Self::build(
            providers,
            Some(base_url.to_string()),
            RecordingNotes::default(),
        )
    }

    pub fn with_notes(providers: ProviderRegistry, notes: RecordingNotes) -> Self {
        Self::build(providers, None, notes)
    }

    fn build(
        providers: ProviderRegistry,
        public_base_url: Option<String>,
        notes: RecordingNotes,
    ) -> Self {
        let repository = Arc::new(InMemoryRecordingRepository::new());
        let store = Arc::new(ObjectStagingStore::in_memory());
        let notifier = Arc::new(BroadcastNotifier::default());
        let sessions = Arc::new(RecordingSessions::default());
        let notes = Arc::new(notes);
        let providers = Arc::new(providers);

        let completion = Arc::new(CompletionTrigger::new(
            sessions.clone(),
            notes.clone(),
            notifier.clone(),
        ));

        let service = Arc::new(TranscriptionService::new(
            repository.clone(),
            providers.clone(),
            store.clone(),
            completion,
            zero_backoff(),
            public_base_url,
        ));

        Self {
            repository,
            store,
            notifier,
            sessions,
            notes,
            providers,
            service,
        }
    }

    /// Stages audio and persists a pending recording.
    pub async fn seed_pending(&self, max_retries: u32, preferred: Option<&str>) -> Recording {
        let recording = pending_recording(max_retries, preferred);
        let path = recording
            .audio
            .storage_path
            .clone()
            .expect("fresh recording has a storage path");
        stage(self.store.as_ref(), &path, TEST_AUDIO).await;
        self.service
            .create_recording(recording)
            .await
            .expect("Failed to create recording")
    }

    pub async fn reload(&self, id: RecordingId) -> Recording {
        use scribeflow::application::ports::RecordingRepository;
        self.repository
            .get_by_id(id)
            .await
            .expect("Failed to load recording")
            .expect("Recording missing")
    }
}
