//! Staging area for the chunks of in-flight uploads.

use std::sync::Arc;

use bytes::Bytes;

use simplehost_core::error::AppError;
use simplehost_core::result::AppResult;
use simplehost_core::traits::storage::StorageProvider;
use simplehost_core::types::UploadId;

/// Directory under the storage root that holds staged chunks.
pub const CHUNK_DIR: &str = "_chunks";

/// Writes, probes, and removes staged chunks.
#[derive(Debug, Clone)]
pub struct ChunkStaging {
    /// The storage provider for temporary chunk storage.
    provider: Arc<dyn StorageProvider>,
}

impl ChunkStaging {
    /// Create a new chunk staging area.
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    /// Upload ids become directory names, so they are restricted to a safe
    /// character set.
    pub fn validate_upload_id(upload_id: &UploadId) -> AppResult<()> {
        let id = upload_id.as_str();
        let valid = !id.is_empty()
            && id.len() <= 128
            && id != "."
            && id != ".."
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(())
        } else {
            Err(AppError::validation(format!("Invalid upload id '{id}'")))
        }
    }

    /// Write a single chunk, replacing any earlier copy of the same index.
    pub async fn write_chunk(&self, upload_id: &UploadId, index: u32, data: Bytes) -> AppResult<u64> {
        let chunk_path = Self::chunk_path(upload_id, index);
        let size = data.len() as u64;
        self.provider.write(&chunk_path, data).await?;
        tracing::debug!(upload_id = %upload_id, index, size, "Staged chunk");
        Ok(size)
    }

    /// Check if a specific chunk exists.
    pub async fn chunk_exists(&self, upload_id: &UploadId, index: u32) -> AppResult<bool> {
        self.provider
            .exists(&Self::chunk_path(upload_id, index))
            .await
    }

    /// The lowest index in `0..total_chunks` that has not been staged.
    pub async fn first_missing(&self, upload_id: &UploadId, total_chunks: u32) -> AppResult<Option<u32>> {
        for index in 0..total_chunks {
            if !self.chunk_exists(upload_id, index).await? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Remove every staged chunk of an upload. Removing twice is harmless.
    pub async fn remove_upload(&self, upload_id: &UploadId) -> AppResult<()> {
        self.provider.delete_dir(&Self::upload_dir(upload_id)).await
    }

    /// Generate the temporary storage path for a chunk.
    pub fn chunk_path(upload_id: &UploadId, index: u32) -> String {
        format!("{CHUNK_DIR}/{upload_id}/{index:06}")
    }

    /// Generate the temporary directory for an upload.
    pub fn upload_dir(upload_id: &UploadId) -> String {
        format!("{CHUNK_DIR}/{upload_id}")
    }
}

#[cfg(test)]
mod tests {
    use crate::providers::LocalStorageProvider;

    use super::*;

    async fn staging() -> (tempfile::TempDir, ChunkStaging) {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalStorageProvider::new(dir.path()).await.unwrap();
        (dir, ChunkStaging::new(Arc::new(provider)))
    }

    #[test]
    fn test_chunk_path_is_zero_padded() {
        let id = UploadId::from("abc");
        assert_eq!(ChunkStaging::chunk_path(&id, 7), "_chunks/abc/000007");
        assert_eq!(ChunkStaging::upload_dir(&id), "_chunks/abc");
    }

    #[test]
    fn test_upload_id_validation() {
        assert!(ChunkStaging::validate_upload_id(&UploadId::from("up-1_a.b")).is_ok());
        assert!(ChunkStaging::validate_upload_id(&UploadId::from("..")).is_err());
        assert!(ChunkStaging::validate_upload_id(&UploadId::from("a/b")).is_err());
        assert!(ChunkStaging::validate_upload_id(&UploadId::from("")).is_err());
    }

    #[tokio::test]
    async fn test_restage_overwrites() {
        let (_dir, staging) = staging().await;
        let id = UploadId::from("u1");
        staging.write_chunk(&id, 0, Bytes::from("old")).await.unwrap();
        staging.write_chunk(&id, 0, Bytes::from("new!")).await.unwrap();
        let staged = staging
            .provider
            .read_bytes(&ChunkStaging::chunk_path(&id, 0))
            .await
            .unwrap();
        assert_eq!(staged, Bytes::from("new!"));
    }

    #[tokio::test]
    async fn test_first_missing_and_remove() {
        let (_dir, staging) = staging().await;
        let id = UploadId::from("u2");
        staging.write_chunk(&id, 0, Bytes::from("a")).await.unwrap();
        staging.write_chunk(&id, 2, Bytes::from("c")).await.unwrap();
        assert_eq!(staging.first_missing(&id, 3).await.unwrap(), Some(1));

        staging.write_chunk(&id, 1, Bytes::from("b")).await.unwrap();
        assert_eq!(staging.first_missing(&id, 3).await.unwrap(), None);

        staging.remove_upload(&id).await.unwrap();
        staging.remove_upload(&id).await.unwrap();
        assert!(!staging.chunk_exists(&id, 0).await.unwrap());
    }
}
