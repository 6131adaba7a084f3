use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Storage provider trait
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Write data under the given key
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    /// Delete data. Deleting a key that does not exist is not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Get the storage type name
    fn storage_type(&self) -> &'static str;
}
