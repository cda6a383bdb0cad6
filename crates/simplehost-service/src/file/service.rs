//! File reads, downloads, deletion, and visibility.

use std::sync::Arc;

use tracing::{info, warn};

use simplehost_core::error::AppError;
use simplehost_core::result::AppResult;
use simplehost_core::traits::storage::{ByteStream, StorageProvider};
use simplehost_core::types::FileId;
use simplehost_database::TreeStore;
use simplehost_entity::file::File;

use crate::access::AccessGuard;
use crate::context::RequestContext;

/// Handles single-file operations with ownership checks.
#[derive(Debug, Clone)]
pub struct FileService {
    /// Tree store.
    tree: Arc<dyn TreeStore>,
    /// Blob storage.
    storage: Arc<dyn StorageProvider>,
}

/// A file opened for download.
pub struct Download {
    /// File metadata.
    pub file: File,
    /// The blob contents.
    pub stream: ByteStream,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download").field("file", &self.file).finish()
    }
}

impl Download {
    /// `Content-Disposition` value suggesting the stored file name.
    pub fn content_disposition(&self) -> String {
        format!(
            "attachment; filename=\"{}\"",
            self.file.name.replace(['"', '\\'], "_")
        )
    }
}

impl FileService {
    /// Creates a new file service.
    pub fn new(tree: Arc<dyn TreeStore>, storage: Arc<dyn StorageProvider>) -> Self {
        Self { tree, storage }
    }

    async fn find(&self, file_id: &FileId) -> AppResult<File> {
        self.tree
            .get_file(file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }

    /// Gets a file the requester is allowed to see.
    pub async fn get_file(&self, ctx: &RequestContext, file_id: &FileId) -> AppResult<File> {
        let file = self.find(file_id).await?;
        AccessGuard::authorize_view(&file, &ctx.requester_id)?;
        Ok(file)
    }

    /// Opens a file's blob for streaming to the requester.
    pub async fn open_file(&self, ctx: &RequestContext, file_id: &FileId) -> AppResult<Download> {
        let file = self.get_file(ctx, file_id).await?;
        let stream = self.storage.read(&file.storage_path).await.map_err(|e| {
            if e.is_not_found() {
                AppError::internal(format!("Blob for file {file_id} is missing"))
            } else {
                e
            }
        })?;

        info!(
            user_id = %ctx.requester_id,
            file_id = %file.id,
            "File download started"
        );

        Ok(Download { file, stream })
    }

    /// Deletes a file row and prunes its blob. Owner only.
    pub async fn delete_file(&self, ctx: &RequestContext, file_id: &FileId) -> AppResult<()> {
        let file = self.find(file_id).await?;
        AccessGuard::authorize_mutation(&file, &ctx.requester_id)?;

        if !self.tree.delete_file(file_id).await? {
            return Err(AppError::not_found(format!("File {file_id} not found")));
        }

        if let Err(e) = self.storage.delete(&file.storage_path).await {
            warn!(file_id = %file_id, path = %file.storage_path, error = %e, "Failed to prune blob");
        }

        info!(
            user_id = %ctx.requester_id,
            file_id = %file_id,
            name = %file.name,
            "File deleted"
        );
        Ok(())
    }

    /// Marks a file private or shared. Owner only.
    pub async fn set_visibility(
        &self,
        ctx: &RequestContext,
        file_id: &FileId,
        is_private: bool,
    ) -> AppResult<File> {
        let file = self.find(file_id).await?;
        AccessGuard::authorize_mutation(&file, &ctx.requester_id)?;

        let file = self.tree.set_file_private(file_id, is_private).await?;
        info!(
            user_id = %ctx.requester_id,
            file_id = %file_id,
            is_private,
            "File visibility changed"
        );
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::TryStreamExt;
    use simplehost_core::error::ErrorKind;
    use simplehost_core::types::{FolderId, UserId};

    use super::*;
    use crate::test_support::Harness;

    async fn stored(h: &Harness, owner: &str, body: &'static str) -> File {
        let file = File::new(FileId::new(), "a.txt", FolderId::root(), UserId::from(owner), body.len() as u64);
        h.storage
            .write(&file.storage_path, Bytes::from(body))
            .await
            .unwrap();
        h.tree.insert_file(&file).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_file_streams_blob() {
        let h = Harness::new().await;
        let svc = h.file_service();
        let file = stored(&h, "u1", "hello").await;

        let download = svc
            .open_file(&RequestContext::new("u2"), &file.id)
            .await
            .unwrap();
        assert_eq!(download.content_disposition(), "attachment; filename=\"a.txt\"");
        let parts: Vec<Bytes> = download.stream.try_collect().await.unwrap();
        assert_eq!(parts.concat(), b"hello");
    }

    #[tokio::test]
    async fn test_private_file_is_owner_only() {
        let h = Harness::new().await;
        let svc = h.file_service();
        let owner = RequestContext::new("u1");
        let file = stored(&h, "u1", "secret").await;
        svc.set_visibility(&owner, &file.id, true).await.unwrap();

        let err = svc
            .open_file(&RequestContext::new("u2"), &file.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
        assert!(svc.get_file(&owner, &file.id).await.unwrap().is_private);
    }

    #[tokio::test]
    async fn test_delete_file() {
        let h = Harness::new().await;
        let svc = h.file_service();
        let file = stored(&h, "u1", "x").await;

        let err = svc
            .delete_file(&RequestContext::new("u2"), &file.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);

        svc.delete_file(&RequestContext::new("u1"), &file.id)
            .await
            .unwrap();
        assert!(!h.storage.exists(&file.storage_path).await.unwrap());

        let err = svc
            .delete_file(&RequestContext::new("u1"), &file.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
