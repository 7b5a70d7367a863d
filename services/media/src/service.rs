//! Ingest and lookup on top of the pipeline, the file storage and the media table

use common::proto::MediaKind;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    error::MediaError,
    pipeline,
    repositories::MediaRepository,
    storage::FileStorage,
};

#[derive(Clone)]
pub struct MediaService {
    storage: FileStorage,
    repository: Arc<dyn MediaRepository>,
    max_size: usize,
}

impl MediaService {
    pub fn new(storage: FileStorage, repository: Arc<dyn MediaRepository>, max_size: usize) -> Self {
        Self {
            storage,
            repository,
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    /// Normalize, persist and register an upload
    pub async fn ingest(&self, kind: MediaKind, upload: Vec<u8>) -> Result<Uuid, MediaError> {
        let max_size = self.max_size;
        let encoded = tokio::task::spawn_blocking(move || pipeline::normalize(&upload, max_size))
            .await
            .map_err(|e| MediaError::StorageFailed(format!("pipeline task failed: {}", e)))??;

        let stored = self.storage.save(kind, &encoded).await?;

        match self.repository.insert(&stored).await {
            Ok(id) => {
                info!(media_id = %id, uri = %stored.uri(), "Media registered");
                Ok(id)
            }
            Err(e) => {
                error!("Failed to register {}: {}", stored.uri(), e);
                self.storage.remove(&stored).await;
                Err(MediaError::StorageFailed(e.to_string()))
            }
        }
    }

    /// `path/filename` of a registered object; the file itself is not opened
    pub async fn uri(&self, id: Uuid) -> Result<String, MediaError> {
        self.repository
            .get(id)
            .await?
            .map(|stored| stored.uri())
            .ok_or(MediaError::NotFound)
    }

    pub async fn ping(&self) -> Result<(), MediaError> {
        Ok(self.repository.ping().await?)
    }
}
