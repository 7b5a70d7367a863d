//! On-disk media storage under a base directory

use common::proto::MediaKind;
use std::path::{Component, Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::MediaError;

/// Location of a stored object relative to the base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: String,
    pub filename: String,
}

impl StoredFile {
    pub fn uri(&self) -> String {
        format!("{}/{}", self.path, self.filename)
    }
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    base: PathBuf,
}

impl FileStorage {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    async fn ensure_dir(dir: &Path) -> std::io::Result<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o755);
        builder.create(dir).await
    }

    /// Write `bytes` as `{kind}/{uuid}.webp`. The final name only appears
    /// once the content is fully written and closed.
    pub async fn save(&self, kind: MediaKind, bytes: &[u8]) -> Result<StoredFile, MediaError> {
        let dir = self.base.join(kind.as_str());
        Self::ensure_dir(&dir)
            .await
            .map_err(|e| MediaError::StorageFailed(format!("create {}: {}", dir.display(), e)))?;

        let filename = format!("{}.webp", Uuid::new_v4());
        let target = dir.join(&filename);
        let partial = dir.join(format!(".{}.part", filename));

        if let Err(e) = Self::write_file(&partial, bytes).await {
            let _ = fs::remove_file(&partial).await;
            return Err(MediaError::StorageFailed(format!(
                "write {}: {}",
                partial.display(),
                e
            )));
        }

        if let Err(e) = fs::rename(&partial, &target).await {
            let _ = fs::remove_file(&partial).await;
            return Err(MediaError::StorageFailed(format!(
                "rename to {}: {}",
                target.display(),
                e
            )));
        }

        info!("Stored media file {}", target.display());
        Ok(StoredFile {
            path: kind.as_str().to_string(),
            filename,
        })
    }

    async fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await
    }

    /// Best-effort removal, used to compensate a failed registration
    pub async fn remove(&self, stored: &StoredFile) {
        let path = self.base.join(&stored.path).join(&stored.filename);
        if let Err(e) = fs::remove_file(&path).await {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }

    /// Resolve a stored uri to a path under the base directory.
    /// Absolute paths and parent components are rejected.
    pub fn resolve(&self, uri: &str) -> Result<PathBuf, MediaError> {
        let relative = Path::new(uri);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

        if uri.is_empty() || !plain {
            return Err(MediaError::InvalidUri(uri.to_string()));
        }
        Ok(self.base.join(relative))
    }

    pub async fn open(&self, uri: &str) -> Result<fs::File, MediaError> {
        let path = self.resolve(uri)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MediaError::NotFound),
            Err(e) => Err(MediaError::StorageFailed(format!(
                "open {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
pub(crate) fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("media-test-{}", Uuid::new_v4()))
}
