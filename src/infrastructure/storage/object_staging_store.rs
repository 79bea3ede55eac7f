use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::{MultipartUpload, ObjectStore, PutPayload};

use crate::application::ports::{StagingStore, StagingStoreError};
use crate::domain::StoragePath;

/// Staging store over any `object_store` backend.
pub struct ObjectStagingStore {
    inner: Arc<dyn ObjectStore>,
    backend: &'static str,
    public_base_url: Option<String>,
}

impl ObjectStagingStore {
    pub fn local(base_path: PathBuf) -> Result<Self, StagingStoreError> {
        std::fs::create_dir_all(&base_path).map_err(StagingStoreError::Io)?;
        let fs = LocalFileSystem::new_with_prefix(base_path)
            .map_err(|e| StagingStoreError::UploadFailed(e.to_string()))?;
        Ok(Self::from_store(Arc::new(fs), "local"))
    }

    pub fn azure(
        account: &str,
        access_key: &str,
        container: &str,
    ) -> Result<Self, StagingStoreError> {
        let store = MicrosoftAzureBuilder::new()
            .with_account(account)
            .with_access_key(access_key)
            .with_container_name(container)
            .build()
            .map_err(|e| StagingStoreError::UploadFailed(e.to_string()))?;
        Ok(Self::from_store(Arc::new(store), "azure"))
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemory::new()), "memory")
    }

    fn from_store(inner: Arc<dyn ObjectStore>, backend: &'static str) -> Self {
        Self {
            inner,
            backend,
            public_base_url: None,
        }
    }

    /// Objects become reachable by providers under `{base}/{object key}`.
    pub fn with_public_base_url(mut self, base: Option<String>) -> Self {
        self.public_base_url = base.map(|b| b.trim_end_matches('/').to_string());
        self
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }
}

fn not_found_or(e: object_store::Error, fallback: fn(String) -> StagingStoreError) -> StagingStoreError {
    match e {
        object_store::Error::NotFound { path, .. } => StagingStoreError::NotFound(path),
        other => fallback(other.to_string()),
    }
}

#[async_trait::async_trait]
impl StagingStore for ObjectStagingStore {
    async fn store(
        &self,
        path: &StoragePath,
        mut stream: BoxStream<'_, Result<Bytes, io::Error>>,
        _content_length: Option<u64>,
    ) -> Result<u64, StagingStoreError> {
        let store_path = StorePath::from(path.as_str());
        let mut upload = self
            .inner
            .put_multipart(&store_path)
            .await
            .map_err(|e| StagingStoreError::UploadFailed(e.to_string()))?;

        let mut total_bytes: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    let _ = upload.abort().await;
                    return Err(StagingStoreError::Io(e));
                }
            };
            total_bytes += bytes.len() as u64;
            if let Err(e) = upload.put_part(PutPayload::from(bytes)).await {
                let _ = upload.abort().await;
                return Err(StagingStoreError::UploadFailed(e.to_string()));
            }
        }

        upload
            .complete()
            .await
            .map_err(|e| StagingStoreError::UploadFailed(e.to_string()))?;

        tracing::debug!(backend = self.backend, path = %path, bytes = total_bytes, "Audio staged");
        Ok(total_bytes)
    }

    async fn fetch(&self, path: &StoragePath) -> Result<Vec<u8>, StagingStoreError> {
        let store_path = StorePath::from(path.as_str());
        let result = self
            .inner
            .get(&store_path)
            .await
            .map_err(|e| not_found_or(e, StagingStoreError::DownloadFailed))?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StagingStoreError::DownloadFailed(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    async fn delete(&self, path: &StoragePath) -> Result<(), StagingStoreError> {
        let store_path = StorePath::from(path.as_str());
        self.inner
            .delete(&store_path)
            .await
            .map_err(|e| not_found_or(e, StagingStoreError::DeleteFailed))
    }

    async fn reachable_url(&self, path: &StoragePath) -> Result<Option<String>, StagingStoreError> {
        Ok(self
            .public_base_url
            .as_ref()
            .map(|base| format!("{}/{}", base, path.as_str())))
    }
}
