use std::sync::Arc;

use scribeflow::application::ports::{CompletionModel, ProviderErrorKind};
use scribeflow::application::services::ProviderRegistry;
use scribeflow::infrastructure::providers::ScriptedProvider;

fn registry() -> ProviderRegistry {
    ProviderRegistry::new("openai")
        .with_provider(Arc::new(ScriptedProvider::new(
            "openai",
            CompletionModel::Synchronous,
        )))
        .with_provider(Arc::new(ScriptedProvider::new(
            "assemblyai",
            CompletionModel::Polling,
        )))
        .with_provider(Arc::new(ScriptedProvider::new(
            "replicate",
            CompletionModel::Webhook,
        )))
}

#[test]
fn given_no_name_when_resolving_then_default_provider_returned() {
    let provider = registry().resolve(None).unwrap();

    assert_eq!(provider.name(), "openai");
}

#[test]
fn given_registered_name_when_resolving_then_that_provider_returned() {
    let provider = registry().resolve(Some("assemblyai")).unwrap();

    assert_eq!(provider.name(), "assemblyai");
    assert_eq!(provider.completion_model(), CompletionModel::Polling);
}

#[test]
fn given_unknown_name_when_resolving_then_unsupported_error() {
    let err = registry().resolve(Some("deepgram")).err().unwrap();

    assert_eq!(err.kind, ProviderErrorKind::Unsupported);
    assert_eq!(err.code, "UNSUPPORTED_PROVIDER");
    assert!(!err.recoverable);
    assert!(err.message.contains("deepgram"));
}

#[test]
fn given_mixed_completion_models_when_filtering_then_names_grouped() {
    let registry = registry();

    assert_eq!(registry.names(), vec!["assemblyai", "openai", "replicate"]);
    assert_eq!(registry.pollable(), vec!["assemblyai", "replicate"]);
    assert_eq!(registry.webhook_capable(), vec!["replicate"]);
    assert!(registry.contains("replicate"));
    assert!(!registry.contains("deepgram"));
}

#[test]
fn given_same_name_registered_twice_when_resolving_then_latest_wins() {
    let mut registry = registry();
    registry.register(Arc::new(ScriptedProvider::new(
        "openai",
        CompletionModel::Polling,
    )));

    let provider = registry.resolve(Some("openai")).unwrap();

    assert_eq!(provider.completion_model(), CompletionModel::Polling);
    assert_eq!(registry.names().len(), 3);
}
