mod completion_trigger;
mod provider_registry;
mod provider_test_harness;
mod retry_scheduler;
mod transcription_service;
mod webhook_reconciler;

pub use completion_trigger::{CompletionTrigger, completion_event};
pub use provider_registry::ProviderRegistry;
pub use provider_test_harness::{
    PollBounds, ProviderErrorView, ProviderTestError, ProviderTestHarness, ProviderTestReport,
    ProviderTestRequest, RecordingPreview,
};
pub use retry_scheduler::{RetryScheduler, RunResult, RunSummary, SchedulerConfig, SchedulerStats};
pub use transcription_service::{
    TranscriptionService, TranscriptionServiceError, TransitionOutcome, WEBHOOK_PATH,
};
pub use webhook_reconciler::{ReconcileError, ReconcileOutcome, WebhookCallback, WebhookReconciler};
