mod environment;
mod settings;

pub use environment::Environment;
pub use settings::{
    AssemblyAiProviderSettings, DatabaseSettings, HarnessSettings, LoggingSettings,
    NotesSettings, OpenAiProviderSettings, PersistenceBackend, PersistenceSettings,
    ProviderSettings, ReplicateProviderSettings, RetrySettings, SchedulerSettings, ServerSettings,
    Settings, StorageProviderSetting, StorageSettings, WebhookSettings,
};
