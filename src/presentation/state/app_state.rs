use std::sync::Arc;

use crate::application::ports::StagingStore;
use crate::application::services::{
    ProviderTestHarness, RetryScheduler, TranscriptionService, WebhookReconciler,
};
use crate::infrastructure::notification::BroadcastNotifier;
use crate::presentation::config::RetrySettings;

#[derive(Clone)]
pub struct AppState {
    pub transcription_service: Arc<TranscriptionService>,
    pub webhook_reconciler: Arc<WebhookReconciler>,
    pub retry_scheduler: Arc<RetryScheduler>,
    pub provider_test_harness: Arc<ProviderTestHarness>,
    pub staging_store: Arc<dyn StagingStore>,
    pub notifier: Arc<BroadcastNotifier>,
    /// Retry policy applied to newly uploaded recordings.
    pub retry_settings: RetrySettings,
}
