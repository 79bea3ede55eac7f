mod attempt;
mod audio_descriptor;
mod error_snapshot;
mod ids;
mod recording;
mod retry_policy;
mod storage_path;
mod transcript;
mod transcription_result;
mod transcription_status;
mod transition;

pub use attempt::{Attempt, AttemptOutcome};
pub use audio_descriptor::AudioDescriptor;
pub use error_snapshot::{EMPTY_TRANSCRIPT, ErrorSnapshot, Failure, RETRY_BUDGET_EXHAUSTED};
pub use ids::{RecordingId, SessionId, UserId};
pub use recording::{ProviderJob, Recording};
pub use retry_policy::{
    BackoffPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY,
    DEFAULT_MAX_RETRIES, RetryPolicy,
};
pub use storage_path::StoragePath;
pub use transcript::{Utterance, join_utterances};
pub use transcription_result::{
    Sentiment, SentimentLabel, SpeakerLabel, TranscriptMetadata, TranscriptionResult,
    WordTimestamp,
};
pub use transcription_status::TranscriptionStatus;
pub use transition::{RecordingEffect, Transition, TransitionError};
