use std::time::Duration;

use scribeflow::presentation::config::{PersistenceBackend, StorageProviderSetting};
use scribeflow::presentation::{Environment, Settings};

#[test]
fn given_test_environment_when_loading_then_appsettings_file_applied() {
    let settings = Settings::load(Environment::Test).unwrap();

    assert_eq!(settings.server.port, 0);
    assert_eq!(settings.persistence.backend, PersistenceBackend::Memory);
    assert_eq!(settings.storage.provider, StorageProviderSetting::Memory);
    assert_eq!(settings.providers.default_provider, "mock");
    assert_eq!(
        settings.providers.mock_transcript.as_deref(),
        Some("test transcript")
    );
    assert!(!settings.scheduler.enabled);
    assert_eq!(settings.logging.level, "warn");
    assert!(settings.database.is_none());
}

#[test]
fn given_missing_retry_section_when_loading_then_defaults_used() {
    let settings = Settings::load(Environment::Test).unwrap();

    assert_eq!(settings.retry.max_retries, 3);
    assert_eq!(settings.storage.local_path, "./data/staging");
}

#[test]
fn given_retry_settings_when_building_backoff_then_delays_capped() {
    let settings = Settings::load(Environment::Test).unwrap();
    let backoff = settings.retry.backoff();

    let far = backoff.delay_for(20, settings.retry.backoff_multiplier);

    assert_eq!(far, Duration::from_secs(settings.retry.max_delay_secs));
}
