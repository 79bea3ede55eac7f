use std::collections::BTreeMap;
use std::sync::Arc;

use crate::application::ports::{CompletionModel, ProviderError, TranscriptionProvider};

/// Configured transcription providers, looked up by name.
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn TranscriptionProvider>>,
    default_provider: String,
}

impl ProviderRegistry {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: BTreeMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn TranscriptionProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn register(&mut self, provider: Arc<dyn TranscriptionProvider>) {
        let name = provider.name().to_string();
        tracing::debug!(
            provider = %name,
            completion_model = provider.completion_model().as_str(),
            "Registered transcription provider"
        );
        self.providers.insert(name, provider);
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    /// Resolves `name`, or the default provider when `name` is `None`.
    pub fn resolve(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn TranscriptionProvider>, ProviderError> {
        let name = name.unwrap_or(&self.default_provider);
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::unsupported(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn names_with(&self, predicate: impl Fn(CompletionModel) -> bool) -> Vec<String> {
        self.providers
            .iter()
            .filter(|(_, p)| predicate(p.completion_model()))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn pollable(&self) -> Vec<String> {
        self.names_with(|model| model.is_pollable())
    }

    pub fn webhook_capable(&self) -> Vec<String> {
        self.names_with(|model| model == CompletionModel::Webhook)
    }
}
