use std::time::Duration;

use config::{Config, ConfigError, File};
use serde::Deserialize;

use super::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub persistence: PersistenceSettings,
    pub database: Option<DatabaseSettings>,
    pub storage: StorageSettings,
    pub providers: ProviderSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub webhook: WebhookSettings,
    #[serde(default)]
    pub notes: NotesSettings,
    #[serde(default)]
    pub harness: HarnessSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Layers `appsettings.{env}.toml` under `APP_`-prefixed environment variables.
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                File::with_name(&format!("appsettings.{}", environment.file_suffix()))
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersistenceSettings {
    #[serde(default)]
    pub backend: PersistenceBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProviderSetting {
    Local,
    Azure,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub provider: StorageProviderSetting,
    #[serde(default = "default_local_path")]
    pub local_path: String,
    /// Base URL under which staged objects are reachable by providers, if any.
    pub public_base_url: Option<String>,
    pub azure_account: Option<String>,
    pub azure_access_key: Option<String>,
    pub azure_container: Option<String>,
}

fn default_local_path() -> String {
    "./data/staging".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub default_provider: String,
    pub openai: Option<OpenAiProviderSettings>,
    pub assemblyai: Option<AssemblyAiProviderSettings>,
    pub replicate: Option<ReplicateProviderSettings>,
    /// Registers an offline `mock` provider that answers with this transcript.
    pub mock_transcript: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiProviderSettings {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssemblyAiProviderSettings {
    pub api_key: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplicateProviderSettings {
    pub api_token: String,
    pub model_version: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub backoff_multiplier: f64,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: crate::domain::DEFAULT_MAX_RETRIES,
            backoff_multiplier: crate::domain::DEFAULT_BACKOFF_MULTIPLIER,
            base_delay_secs: crate::domain::DEFAULT_BASE_DELAY.as_secs(),
            max_delay_secs: crate::domain::DEFAULT_MAX_DELAY.as_secs(),
        }
    }
}

impl RetrySettings {
    pub fn backoff(&self) -> crate::domain::BackoffPolicy {
        crate::domain::BackoffPolicy::new(
            Duration::from_secs(self.base_delay_secs),
            Duration::from_secs(self.max_delay_secs),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub interval_secs: u64,
    pub batch_size: usize,
    pub stall_timeout_secs: u64,
    #[serde(default = "default_pending_grace_secs")]
    pub pending_grace_secs: u64,
}

fn default_pending_grace_secs() -> u64 {
    120
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            batch_size: 50,
            stall_timeout_secs: 1800,
            pending_grace_secs: default_pending_grace_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookSettings {
    /// Externally reachable base URL of this service, used to build provider callback URLs.
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotesSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarnessSettings {
    pub max_polls: u32,
    pub poll_interval_secs: u64,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            max_polls: 60,
            poll_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub enable_json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info,scribeflow=debug,tower_http=debug".to_string(),
            enable_json: false,
        }
    }
}
