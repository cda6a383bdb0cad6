//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use tempfile::TempDir;

use simplehost_core::config::{AppConfig, CascadeOwnership};
use simplehost_core::result::AppResult;
use simplehost_core::traits::storage::StorageProvider;
use simplehost_core::types::{FolderId, UploadId};
use simplehost_database::migration::run_migrations;
use simplehost_database::{DatabasePool, SqlTreeStore, TreeStore};
use simplehost_entity::file::File;
use simplehost_entity::folder::Folder;
use simplehost_service::{
    ChunkAck, ChunkUpload, CreateFolderRequest, DeletionCoordinator, FileService, FolderService,
    RequestContext, UploadService,
};
use simplehost_storage::LocalStorageProvider;

/// Test application context: every service over one in-memory store and a
/// temporary blob root.
pub struct TestApp {
    /// Tree store for direct assertions.
    pub tree: Arc<dyn TreeStore>,
    /// Blob storage for direct assertions.
    pub storage: Arc<dyn StorageProvider>,
    /// Folder service.
    pub folders: FolderService,
    /// File service.
    pub files: FileService,
    /// Upload service.
    pub uploads: UploadService,
    /// Deletion coordinator.
    pub deletion: DeletionCoordinator,
    /// Application config.
    pub config: AppConfig,
    _dir: TempDir,
}

impl TestApp {
    /// Create a new test application with the default cascade policy.
    pub async fn new() -> Self {
        Self::with_cascade(CascadeOwnership::Permissive).await
    }

    /// Create a new test application with the given cascade policy.
    pub async fn with_cascade(cascade_ownership: CascadeOwnership) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = AppConfig::with_database_url("sqlite::memory:");
        config.storage.root_path = dir.path().to_string_lossy().into_owned();
        config.tree.cascade_ownership = cascade_ownership;

        let db = DatabasePool::connect(&config.database)
            .await
            .expect("Failed to connect to test database");
        run_migrations(db.pool())
            .await
            .expect("Failed to run migrations");

        let tree: Arc<dyn TreeStore> = Arc::new(SqlTreeStore::new(db.into_pool()));
        let storage: Arc<dyn StorageProvider> = Arc::new(
            LocalStorageProvider::new(&config.storage.root_path)
                .await
                .expect("Failed to init storage"),
        );

        let folders = FolderService::new(Arc::clone(&tree), &config.tree);
        folders.ensure_root().await.expect("Failed to create root");

        Self {
            files: FileService::new(Arc::clone(&tree), Arc::clone(&storage)),
            uploads: UploadService::new(
                Arc::clone(&tree),
                Arc::clone(&storage),
                config.storage.clone(),
                config.upload.clone(),
            ),
            deletion: DeletionCoordinator::new(Arc::clone(&tree), Arc::clone(&storage), &config.tree),
            folders,
            tree,
            storage,
            config,
            _dir: dir,
        }
    }

    /// Create a folder as `user`.
    pub async fn create_folder(&self, user: &str, parent: &FolderId, name: &str) -> Folder {
        self.folders
            .create_folder(
                &RequestContext::new(user),
                CreateFolderRequest {
                    parent_id: Some(parent.clone()),
                    name: name.to_string(),
                    is_private: false,
                },
            )
            .await
            .expect("Failed to create folder")
    }

    /// Upload `data` as a single-chunk file.
    pub async fn upload(
        &self,
        user: &str,
        folder: &FolderId,
        name: &str,
        data: &'static [u8],
        overwrite: bool,
    ) -> AppResult<File> {
        let ack = self
            .uploads
            .stage_chunk(
                &RequestContext::new(user),
                ChunkUpload {
                    upload_id: UploadId::new(),
                    folder_id: Some(folder.clone()),
                    file_name: name.to_string(),
                    chunk_index: 0,
                    total_chunks: 1,
                    overwrite,
                    is_private: false,
                    data: Bytes::from_static(data),
                },
            )
            .await?;
        match ack {
            ChunkAck::Completed(file) => Ok(file),
            other => panic!("single-chunk upload did not complete: {other:?}"),
        }
    }
}
