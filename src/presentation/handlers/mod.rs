mod admin;
mod events;
mod health;
mod multipart_form;
mod recordings;
pub mod responses;
mod webhook;

pub use admin::{provider_test_handler, retry_sweep_handler, scheduler_stats_handler};
pub use events::user_events_handler;
pub use health::health_handler;
pub use recordings::{
    get_recording_handler, start_transcription_handler, upload_recording_handler,
};
pub use webhook::transcription_webhook_handler;
