mod in_memory_recording_repository;
mod pg_recording_repository;

pub use in_memory_recording_repository::InMemoryRecordingRepository;
pub use pg_recording_repository::PgRecordingRepository;
