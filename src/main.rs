use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;

use scribeflow::application::ports::{
    NoteGenerator, Notifier, RecordingRepository, SessionLifecycle,
};
use scribeflow::application::services::{
    CompletionTrigger, PollBounds, ProviderTestHarness, RetryScheduler, SchedulerConfig,
    TranscriptionService, WebhookReconciler,
};
use scribeflow::infrastructure::crypto::PassthroughCipher;
use scribeflow::infrastructure::notes::{DisabledNoteGenerator, HttpNoteGenerator};
use scribeflow::infrastructure::notification::BroadcastNotifier;
use scribeflow::infrastructure::observability::{TracingConfig, init_tracing};
use scribeflow::infrastructure::persistence::{
    InMemoryRecordingRepository, PgRecordingRepository, create_pool, run_migrations,
};
use scribeflow::infrastructure::providers::ProviderFactory;
use scribeflow::infrastructure::sessions::{DetachedSessionLifecycle, PgSessionLifecycle};
use scribeflow::infrastructure::storage::StagingStoreFactory;
use scribeflow::presentation::config::PersistenceBackend;
use scribeflow::presentation::{AppState, Environment, Settings, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment).context("Failed to load settings")?;

    init_tracing(&TracingConfig::from_settings(environment, &settings.logging));

    let (repository, sessions): (Arc<dyn RecordingRepository>, Arc<dyn SessionLifecycle>) =
        match settings.persistence.backend {
            PersistenceBackend::Memory => {
                tracing::warn!("Using in-memory persistence; recordings are lost on restart");
                (
                    Arc::new(InMemoryRecordingRepository::new()),
                    Arc::new(DetachedSessionLifecycle),
                )
            }
            PersistenceBackend::Postgres => {
                let database = settings
                    .database
                    .as_ref()
                    .context("persistence.backend = postgres requires a [database] section")?;
                let pool = create_pool(database).await?;
                run_migrations(&pool).await?;
                (
                    Arc::new(PgRecordingRepository::new(
                        pool.clone(),
                        Arc::new(PassthroughCipher),
                    )),
                    Arc::new(PgSessionLifecycle::new(pool)),
                )
            }
        };

    let staging_store = StagingStoreFactory::create(&settings.storage)?;
    let providers = Arc::new(ProviderFactory::create(&settings.providers)?);
    tracing::info!(
        providers = ?providers.names(),
        default_provider = providers.default_provider(),
        "Transcription providers registered"
    );

    let notifier = Arc::new(BroadcastNotifier::default());
    let notes: Arc<dyn NoteGenerator> = match &settings.notes.endpoint {
        Some(endpoint) => Arc::new(HttpNoteGenerator::new(
            endpoint.clone(),
            settings.notes.api_key.clone(),
        )),
        None => Arc::new(DisabledNoteGenerator),
    };
    let completion = Arc::new(CompletionTrigger::new(
        sessions,
        notes,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
    ));

    let transcription_service = Arc::new(TranscriptionService::new(
        repository,
        Arc::clone(&providers),
        Arc::clone(&staging_store),
        completion,
        settings.retry.backoff(),
        settings.webhook.public_base_url.clone(),
    ));

    let webhook_reconciler = Arc::new(WebhookReconciler::new(Arc::clone(
        &transcription_service,
    )));

    let provider_test_harness = Arc::new(ProviderTestHarness::new(
        Arc::clone(&providers),
        Arc::clone(&staging_store),
        PollBounds {
            max_polls: settings.harness.max_polls,
            interval: Duration::from_secs(settings.harness.poll_interval_secs),
        },
    ));

    let retry_scheduler = Arc::new(RetryScheduler::new(
        Arc::clone(&transcription_service),
        SchedulerConfig {
            interval: Duration::from_secs(settings.scheduler.interval_secs),
            batch_size: settings.scheduler.batch_size,
            stall_timeout: Duration::from_secs(settings.scheduler.stall_timeout_secs),
            pending_grace: Duration::from_secs(settings.scheduler.pending_grace_secs),
        },
    ));
    if settings.scheduler.enabled {
        retry_scheduler.start();
    } else {
        tracing::info!("Retry scheduler disabled");
    }

    let state = AppState {
        transcription_service,
        webhook_reconciler,
        retry_scheduler: Arc::clone(&retry_scheduler),
        provider_test_harness,
        staging_store,
        notifier,
        retry_settings: settings.retry.clone(),
    };

    let router = create_router(state);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    retry_scheduler.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
