use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::job::{Artifact, ArtifactKind};

/// Where original uploads and processed artifacts live.
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    /// Store the uploaded original and return its storage key.
    async fn write_original(&self, job_id: Uuid, data: &[u8]) -> Result<String, StorageError>;

    async fn read_original(&self, job_id: Uuid) -> Result<Vec<u8>, StorageError>;

    async fn write_artifact(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
        data: &[u8],
    ) -> Result<Artifact, StorageError>;

    async fn read_artifact(&self, job_id: Uuid, kind: ArtifactKind)
        -> Result<Vec<u8>, StorageError>;
}

fn original_key(job_id: Uuid) -> String {
    format!("uploads/original/{}", job_id)
}

fn artifact_key(job_id: Uuid, kind: ArtifactKind) -> String {
    format!("uploads/{}/{}.jpg", kind, job_id)
}

/// Filesystem storage rooted at a media directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        tracing::debug!(key = %key, bytes = data.len(), "Stored object");
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        match tokio::fs::read(self.root.join(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[async_trait]
impl PhotoStorage for LocalStorage {
    async fn write_original(&self, job_id: Uuid, data: &[u8]) -> Result<String, StorageError> {
        let key = original_key(job_id);
        self.write(&key, data).await?;
        Ok(key)
    }

    async fn read_original(&self, job_id: Uuid) -> Result<Vec<u8>, StorageError> {
        self.read(&original_key(job_id)).await
    }

    async fn write_artifact(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
        data: &[u8],
    ) -> Result<Artifact, StorageError> {
        let key = artifact_key(job_id, kind);
        self.write(&key, data).await?;
        Ok(Artifact {
            key,
            size: data.len() as u64,
        })
    }

    async fn read_artifact(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
    ) -> Result<Vec<u8>, StorageError> {
        self.read(&artifact_key(job_id, kind)).await
    }
}

/// Process-local storage, used by tests and single-node setups without a
/// media directory.
#[derive(Default)]
pub struct InMemoryStorage {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

#[async_trait]
impl PhotoStorage for InMemoryStorage {
    async fn write_original(&self, job_id: Uuid, data: &[u8]) -> Result<String, StorageError> {
        let key = original_key(job_id);
        self.objects.write().await.insert(key.clone(), data.to_vec());
        Ok(key)
    }

    async fn read_original(&self, job_id: Uuid) -> Result<Vec<u8>, StorageError> {
        self.read(&original_key(job_id)).await
    }

    async fn write_artifact(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
        data: &[u8],
    ) -> Result<Artifact, StorageError> {
        let key = artifact_key(job_id, kind);
        self.objects.write().await.insert(key.clone(), data.to_vec());
        Ok(Artifact {
            key,
            size: data.len() as u64,
        })
    }

    async fn read_artifact(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
    ) -> Result<Vec<u8>, StorageError> {
        self.read(&artifact_key(job_id, kind)).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let id = Uuid::new_v4();

        let key = storage.write_original(id, b"original").await.unwrap();
        assert_eq!(key, format!("uploads/original/{}", id));
        assert_eq!(storage.read_original(id).await.unwrap(), b"original");

        let artifact = storage
            .write_artifact(id, ArtifactKind::WatermarkRemoved, b"clean")
            .await
            .unwrap();
        assert_eq!(artifact.size, 5);
        assert!(dir
            .path()
            .join(format!("uploads/watermark_removed/{}.jpg", id))
            .exists());
        assert_eq!(
            storage
                .read_artifact(id, ArtifactKind::WatermarkRemoved)
                .await
                .unwrap(),
            b"clean"
        );
    }

    #[tokio::test]
    async fn test_missing_objects_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStorage::new(dir.path());
        let memory = InMemoryStorage::new();
        let id = Uuid::new_v4();

        assert!(matches!(
            local.read_original(id).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            memory.read_artifact(id, ArtifactKind::Compressed).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_in_memory_storage_keys() {
        let storage = InMemoryStorage::new();
        assert!(storage.is_empty().await);
        let id = Uuid::new_v4();
        storage.write_original(id, b"a").await.unwrap();
        let artifact = storage
            .write_artifact(id, ArtifactKind::Compressed, b"bb")
            .await
            .unwrap();
        assert_eq!(artifact.key, format!("uploads/compressed/{}.jpg", id));
        assert_eq!(storage.len().await, 2);
    }
}
