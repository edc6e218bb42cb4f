//! services/api/src/adapters/storage.rs
//!
//! Local-disk implementation of the `FileStorage` port.

use async_trait::async_trait;
use insight_core::domain::DocumentFormat;
use insight_core::ports::{FileStorage, PortError, PortResult};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

/// Stores uploaded files as `<root>/<document id>.<ext>`.
#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the storage directory if it does not exist yet.
    pub async fn ensure_root(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    async fn write_all(path: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    fn location_for(&self, document_id: Uuid, format: DocumentFormat) -> PathBuf {
        self.root
            .join(format!("{}.{}", document_id, format.extension()))
    }

    async fn write(&self, location: &Path, data: &[u8]) -> PortResult<()> {
        // Written under a temporary name and renamed, so readers never see a partial file.
        let mut partial = location.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        let result = match Self::write_all(&partial, data).await {
            Ok(()) => tokio::fs::rename(&partial, location).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove partial upload {}: {}", partial.display(), cleanup);
                }
            }
            return Err(PortError::Unexpected(format!(
                "Failed to write {}: {}",
                location.display(),
                e
            )));
        }
        Ok(())
    }

    async fn delete(&self, location: &Path) -> PortResult<()> {
        tokio::fs::remove_file(location).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                PortError::NotFound(format!("Stored file {} not found", location.display()))
            }
            _ => PortError::Unexpected(format!("Failed to delete {}: {}", location.display(), e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_derived_from_identity_and_format() {
        let storage = LocalFileStorage::new("/srv/uploads");
        let id = Uuid::new_v4();
        assert_eq!(
            storage.location_for(id, DocumentFormat::Pdf),
            PathBuf::from(format!("/srv/uploads/{}.pdf", id))
        );
    }

    #[tokio::test]
    async fn write_then_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());
        let location = storage.location_for(Uuid::new_v4(), DocumentFormat::PlainText);

        storage.write(&location, b"hello").await.unwrap();
        assert_eq!(tokio::fs::read(&location).await.unwrap(), b"hello");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        storage.delete(&location).await.unwrap();
        assert!(!location.exists());
        assert!(matches!(
            storage.delete(&location).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path().join("missing-subdir"));
        let location = storage.location_for(Uuid::new_v4(), DocumentFormat::PlainText);

        assert!(storage.write(&location, b"data").await.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
