use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::StorageProvider;

/// Local file system storage provider rooted at the upload directory
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Keys are flat file names; anything that could escape the base
    /// directory is rejected.
    fn get_full_path(&self, path: &str) -> Result<PathBuf> {
        if path.is_empty() || path.contains(['/', '\\']) || path == "." || path == ".." {
            return Err(AppError::Internal(format!("Invalid storage key: {:?}", path)));
        }
        Ok(self.base_path.join(path))
    }
}

#[async_trait]
impl StorageProvider for LocalStorage {
    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let full_path = self.get_full_path(path)?;

        fs::create_dir_all(&self.base_path).await?;

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        tracing::debug!("Saved file to {:?}", full_path);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.get_full_path(path)?;

        match fs::remove_file(&full_path).await {
            Ok(()) => {
                tracing::debug!("Deleted file {:?}", full_path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn storage_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.put("a.txt", Bytes::from_static(b"hola")).await.unwrap();
        assert!(dir.path().join("a.txt").exists());
        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"hola");

        storage.delete("a.txt").await.unwrap();
        assert!(!dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.delete("never-written.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        assert!(storage.put("../escape", Bytes::new()).await.is_err());
        assert!(storage.delete("sub/dir.txt").await.is_err());
        assert!(storage.delete("..").await.is_err());
    }

    #[tokio::test]
    async fn test_creates_base_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("uploads"));

        storage.put("x.bin", Bytes::from_static(&[1, 2, 3])).await.unwrap();
        assert!(storage.base_path().join("x.bin").exists());
        assert_eq!(storage.storage_type(), "local");
    }
}
