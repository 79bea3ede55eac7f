mod assemblyai_provider;
mod http_errors;
mod mock_provider;
mod openai_whisper_provider;
mod provider_factory;
mod replicate_provider;

pub use assemblyai_provider::{ASSEMBLYAI_PROVIDER, AssemblyAiProvider};
pub use mock_provider::{ScriptedProvider, ScriptedStep};
pub use openai_whisper_provider::{OPENAI_PROVIDER, OpenAiWhisperProvider};
pub use provider_factory::ProviderFactory;
pub use replicate_provider::{REPLICATE_PROVIDER, ReplicateProvider, parse_prediction};
