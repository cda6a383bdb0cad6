//! Chunk assembler: streams staged chunks into one blob.

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};

use simplehost_core::result::AppResult;
use simplehost_core::traits::storage::{ByteStream, StorageProvider};
use simplehost_core::types::UploadId;

use super::staging::ChunkStaging;

/// Concatenates staged chunks into a final blob.
#[derive(Debug, Clone)]
pub struct ChunkAssembler {
    /// Provider holding both the staged chunks and the target blob.
    provider: Arc<dyn StorageProvider>,
}

impl ChunkAssembler {
    /// Create a new chunk assembler.
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    /// Assemble chunks `0..total_chunks` in index order into `target_path`.
    ///
    /// Chunks are streamed one at a time into `{target_path}.part`, which is
    /// renamed over the target only once every byte is written. On failure
    /// the partial blob is removed. Returns the total number of bytes.
    pub async fn assemble(
        &self,
        upload_id: &UploadId,
        total_chunks: u32,
        target_path: &str,
    ) -> AppResult<u64> {
        tracing::info!(
            upload_id = %upload_id,
            total_chunks,
            target_path,
            "Assembling chunks"
        );

        let part_path = format!("{target_path}.part");
        let written = match self
            .provider
            .write_stream(&part_path, self.chunk_stream(upload_id, total_chunks))
            .await
        {
            Ok(written) => written,
            Err(e) => {
                self.discard(&part_path).await;
                return Err(e);
            }
        };

        if let Err(e) = self.provider.rename(&part_path, target_path).await {
            self.discard(&part_path).await;
            return Err(e);
        }

        tracing::info!(
            upload_id = %upload_id,
            bytes = written,
            "Assembly complete"
        );

        Ok(written)
    }

    /// A lazy stream over the staged chunks, in index order.
    fn chunk_stream(&self, upload_id: &UploadId, total_chunks: u32) -> ByteStream {
        let provider = Arc::clone(&self.provider);
        let upload_id = upload_id.clone();
        let stream = futures::stream::iter(0..total_chunks)
            .then(move |index| {
                let provider = Arc::clone(&provider);
                let path = ChunkStaging::chunk_path(&upload_id, index);
                async move { provider.read(&path).await.map_err(std::io::Error::other) }
            })
            .try_flatten();
        Box::pin(stream)
    }

    async fn discard(&self, part_path: &str) {
        if let Err(e) = self.provider.delete(part_path).await {
            tracing::warn!(path = part_path, error = %e, "Failed to remove partial blob");
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::providers::LocalStorageProvider;

    use super::*;

    async fn setup() -> (tempfile::TempDir, Arc<dyn StorageProvider>) {
        let dir = tempfile::tempdir().unwrap();
        let provider: Arc<dyn StorageProvider> =
            Arc::new(LocalStorageProvider::new(dir.path()).await.unwrap());
        (dir, provider)
    }

    #[tokio::test]
    async fn test_assembles_in_index_order() {
        let (_dir, provider) = setup().await;
        let staging = ChunkStaging::new(Arc::clone(&provider));
        let id = UploadId::from("u1");
        // Staged out of order on purpose.
        staging.write_chunk(&id, 2, Bytes::from("C")).await.unwrap();
        staging.write_chunk(&id, 0, Bytes::from("AA")).await.unwrap();
        staging.write_chunk(&id, 1, Bytes::from("B")).await.unwrap();

        let assembler = ChunkAssembler::new(Arc::clone(&provider));
        let size = assembler.assemble(&id, 3, "blobs/f1").await.unwrap();

        assert_eq!(size, 4);
        assert_eq!(provider.read_bytes("blobs/f1").await.unwrap(), Bytes::from("AABC"));
        assert!(!provider.exists("blobs/f1.part").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_chunk_leaves_no_blob() {
        let (_dir, provider) = setup().await;
        let staging = ChunkStaging::new(Arc::clone(&provider));
        let id = UploadId::from("u2");
        staging.write_chunk(&id, 0, Bytes::from("A")).await.unwrap();

        let assembler = ChunkAssembler::new(Arc::clone(&provider));
        assert!(assembler.assemble(&id, 2, "blobs/f2").await.is_err());
        assert!(!provider.exists("blobs/f2").await.unwrap());
        assert!(!provider.exists("blobs/f2.part").await.unwrap());
    }
}
