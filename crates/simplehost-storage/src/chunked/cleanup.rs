//! Orphan chunk cleanup.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use simplehost_core::result::AppResult;
use simplehost_core::traits::storage::StorageProvider;
use simplehost_core::types::UploadId;

use super::staging::{CHUNK_DIR, ChunkStaging};

/// Cleans up chunk directories left behind by abandoned or crashed uploads.
#[derive(Debug, Clone)]
pub struct OrphanChunkCleanup {
    /// Storage provider where chunks are stored.
    provider: Arc<dyn StorageProvider>,
}

impl OrphanChunkCleanup {
    /// Create a new orphan chunk cleanup handler.
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    /// Delete the chunk directory for a specific upload.
    pub async fn cleanup_upload(&self, upload_id: &UploadId) -> AppResult<()> {
        self.provider
            .delete_dir(&ChunkStaging::upload_dir(upload_id))
            .await?;
        tracing::debug!(upload_id = %upload_id, "Cleaned up orphan chunks");
        Ok(())
    }

    /// List the upload ids that currently have a staging directory.
    pub async fn list_upload_dirs(&self) -> AppResult<Vec<UploadId>> {
        let entries = self.provider.list(CHUNK_DIR).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.is_directory)
            .filter_map(|e| e.path.rsplit('/').next().map(UploadId::from))
            .collect())
    }

    /// Remove staging directories untouched since `cutoff` whose upload is
    /// not in `active`. Returns how many were removed.
    ///
    /// Directories that survive a process restart have no session, so this
    /// is the only way they are reclaimed.
    pub async fn sweep(&self, cutoff: DateTime<Utc>, active: &HashSet<UploadId>) -> AppResult<usize> {
        let entries = self.provider.list(CHUNK_DIR).await?;
        let mut removed = 0;
        for entry in entries.into_iter().filter(|e| e.is_directory) {
            let Some(name) = entry.path.rsplit('/').next() else {
                continue;
            };
            let upload_id = UploadId::from(name);
            if active.contains(&upload_id) {
                continue;
            }
            let stale = entry.last_modified.is_none_or(|modified| modified < cutoff);
            if !stale {
                continue;
            }
            match self.cleanup_upload(&upload_id).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(upload_id = %upload_id, error = %e, "Failed to sweep chunk directory");
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chrono::Duration;

    use crate::providers::LocalStorageProvider;

    use super::*;

    async fn setup() -> (tempfile::TempDir, ChunkStaging, OrphanChunkCleanup) {
        let dir = tempfile::tempdir().unwrap();
        let provider: Arc<dyn StorageProvider> =
            Arc::new(LocalStorageProvider::new(dir.path()).await.unwrap());
        (
            dir,
            ChunkStaging::new(Arc::clone(&provider)),
            OrphanChunkCleanup::new(provider),
        )
    }

    #[tokio::test]
    async fn test_list_upload_dirs() {
        let (_dir, staging, cleanup) = setup().await;
        staging
            .write_chunk(&UploadId::from("a"), 0, Bytes::from("x"))
            .await
            .unwrap();
        staging
            .write_chunk(&UploadId::from("b"), 0, Bytes::from("y"))
            .await
            .unwrap();

        let mut ids = cleanup.list_upload_dirs().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec![UploadId::from("a"), UploadId::from("b")]);
    }

    #[tokio::test]
    async fn test_sweep_skips_active_and_recent() {
        let (_dir, staging, cleanup) = setup().await;
        let active_id = UploadId::from("active");
        let orphan_id = UploadId::from("orphan");
        staging.write_chunk(&active_id, 0, Bytes::from("x")).await.unwrap();
        staging.write_chunk(&orphan_id, 0, Bytes::from("y")).await.unwrap();

        let active: HashSet<UploadId> = [active_id.clone()].into_iter().collect();

        // Nothing is older than an hour ago.
        let removed = cleanup
            .sweep(Utc::now() - Duration::hours(1), &active)
            .await
            .unwrap();
        assert_eq!(removed, 0);

        // Everything is older than a cutoff in the future.
        let removed = cleanup
            .sweep(Utc::now() + Duration::hours(1), &active)
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(staging.chunk_exists(&active_id, 0).await.unwrap());
        assert!(!staging.chunk_exists(&orphan_id, 0).await.unwrap());
    }
}
