use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::UploadedFile;
use crate::storage::StorageProvider;

/// Prefix of the `ruta` column; the upload directory is served under it
pub const RUTA_PREFIX: &str = "uploads";

/// Upload service
pub struct UploadService;

impl UploadService {
    /// Replace every character outside `[A-Za-z0-9_.-]` with `_`
    pub fn sanitize_file_name(name: &str) -> String {
        let safe: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        // A bare "." or ".." would name a directory
        if safe.chars().all(|c| c == '.') {
            return safe.replace('.', "_");
        }
        safe
    }

    /// Storage key for a new upload: `<millis>_<8 hex>_<sanitized name>`
    pub fn storage_key(original_name: &str) -> String {
        let nonce = Uuid::new_v4().simple().to_string();
        format!(
            "{}_{}_{}",
            Utc::now().timestamp_millis(),
            &nonce[..8],
            Self::sanitize_file_name(original_name)
        )
    }

    /// Write one uploaded part to storage and describe it
    pub async fn store(
        storage: &dyn StorageProvider,
        original_name: &str,
        mime: Option<String>,
        data: Bytes,
    ) -> Result<UploadedFile> {
        let storage_key = Self::storage_key(original_name);
        let size = data.len() as i64;

        storage.put(&storage_key, data).await?;

        Ok(UploadedFile {
            original_name: original_name.to_string(),
            ruta: format!("{}/{}", RUTA_PREFIX, storage_key),
            storage_key,
            mime: mime.filter(|m| !m.is_empty()),
            size: Some(size),
        })
    }

    /// Best-effort removal of the request's uploads. Failures are logged
    /// and otherwise ignored.
    pub async fn discard(storage: &dyn StorageProvider, files: &[UploadedFile]) {
        for file in files {
            if let Err(e) = storage.delete(&file.storage_key).await {
                tracing::warn!(
                    "Failed to remove upload {} from {} storage: {}",
                    file.storage_key,
                    storage.storage_type(),
                    e
                );
            }
        }
    }
}
