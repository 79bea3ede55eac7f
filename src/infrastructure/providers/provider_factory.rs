use std::sync::Arc;

use crate::application::ports::ProviderError;
use crate::application::services::ProviderRegistry;
use crate::presentation::config::ProviderSettings;

use super::assemblyai_provider::AssemblyAiProvider;
use super::mock_provider::ScriptedProvider;
use super::openai_whisper_provider::OpenAiWhisperProvider;
use super::replicate_provider::ReplicateProvider;

pub struct ProviderFactory;

impl ProviderFactory {
    /// Registers every provider that has credentials configured.
    pub fn create(settings: &ProviderSettings) -> Result<ProviderRegistry, ProviderError> {
        let mut registry = ProviderRegistry::new(settings.default_provider.clone());

        if let Some(openai) = &settings.openai {
            registry.register(Arc::new(OpenAiWhisperProvider::new(
                openai.api_key.clone(),
                openai.base_url.clone(),
                openai.model.clone(),
            )));
        }
        if let Some(assemblyai) = &settings.assemblyai {
            registry.register(Arc::new(AssemblyAiProvider::new(
                assemblyai.api_key.clone(),
                assemblyai.base_url.clone(),
            )));
        }
        if let Some(replicate) = &settings.replicate {
            registry.register(Arc::new(ReplicateProvider::new(
                replicate.api_token.clone(),
                replicate.model_version.clone(),
                replicate.base_url.clone(),
            )));
        }

        if let Some(transcript) = &settings.mock_transcript {
            registry.register(Arc::new(ScriptedProvider::echo("mock", transcript.clone())));
        }

        if !registry.contains(&settings.default_provider) {
            return Err(ProviderError::unsupported(&settings.default_provider));
        }

        tracing::info!(
            providers = ?registry.names(),
            default_provider = %settings.default_provider,
            "Transcription providers configured"
        );
        Ok(registry)
    }
}
