use std::path::PathBuf;
use std::sync::Arc;

use crate::application::ports::{StagingStore, StagingStoreError};
use crate::presentation::config::{StorageProviderSetting, StorageSettings};

use super::object_staging_store::ObjectStagingStore;

pub struct StagingStoreFactory;

impl StagingStoreFactory {
    pub fn create(settings: &StorageSettings) -> Result<Arc<dyn StagingStore>, StagingStoreError> {
        let store = match settings.provider {
            StorageProviderSetting::Local => {
                ObjectStagingStore::local(PathBuf::from(&settings.local_path))?
            }
            StorageProviderSetting::Azure => {
                let account = settings.azure_account.as_deref().ok_or_else(|| {
                    StagingStoreError::UploadFailed("azure_account required".into())
                })?;
                let key = settings.azure_access_key.as_deref().ok_or_else(|| {
                    StagingStoreError::UploadFailed("azure_access_key required".into())
                })?;
                let container = settings.azure_container.as_deref().ok_or_else(|| {
                    StagingStoreError::UploadFailed("azure_container required".into())
                })?;
                ObjectStagingStore::azure(account, key, container)?
            }
            StorageProviderSetting::Memory => ObjectStagingStore::in_memory(),
        };

        let store = store.with_public_base_url(settings.public_base_url.clone());
        tracing::info!(backend = store.backend(), "Staging store configured");
        Ok(Arc::new(store))
    }
}
