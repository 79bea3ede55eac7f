mod field_cipher;
mod note_generator;
mod notifier;
mod recording_repository;
mod repository_error;
mod session_lifecycle;
mod staging_store;
mod transcription_provider;

pub use field_cipher::{CipherError, FieldCipher};
pub use note_generator::{NoteGenerator, NoteGeneratorError};
pub use notifier::{Notifier, NotifierError, RoomEvent, TRANSCRIPTION_COMPLETED_EVENT, user_room};
pub use recording_repository::RecordingRepository;
pub use repository_error::RepositoryError;
pub use session_lifecycle::{SessionLifecycle, SessionLifecycleError};
pub use staging_store::{StagingStore, StagingStoreError};
pub use transcription_provider::{
    AudioSource, CompletionModel, PendingJob, PollOutcome, ProviderError, ProviderErrorKind,
    ProviderOutcome, TranscriptionOptions, TranscriptionProvider,
};
