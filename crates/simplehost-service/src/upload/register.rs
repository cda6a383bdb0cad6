//! Registration of assembled blobs as file rows.

use std::sync::Arc;

use tracing::{info, warn};

use simplehost_core::error::AppError;
use simplehost_core::result::AppResult;
use simplehost_core::traits::storage::StorageProvider;
use simplehost_core::types::{FolderId, UserId};
use simplehost_database::TreeStore;
use simplehost_entity::file::File;

use crate::access::AccessGuard;

/// Applies the name-collision policy when a new blob becomes a file.
///
/// Shared by chunked finalization and bulk ingest so both follow the same
/// rules: a taken name is a `Conflict` unless `overwrite` is set, in which
/// case the old row is swapped out atomically and its blob pruned.
#[derive(Debug, Clone)]
pub struct FileRegistrar {
    tree: Arc<dyn TreeStore>,
    storage: Arc<dyn StorageProvider>,
}

impl FileRegistrar {
    /// Creates a new registrar.
    pub fn new(tree: Arc<dyn TreeStore>, storage: Arc<dyn StorageProvider>) -> Self {
        Self { tree, storage }
    }

    /// Check whether `name` may be written into `folder_id` by `owner_id`.
    ///
    /// Fails with `NotFound` for a missing folder, `Conflict` for a taken
    /// name without `overwrite`, and `Forbidden` when overwriting a file
    /// owned by someone else.
    pub async fn check_slot(
        &self,
        folder_id: &FolderId,
        name: &str,
        owner_id: &UserId,
        overwrite: bool,
    ) -> AppResult<()> {
        if self.tree.get_folder(folder_id).await?.is_none() {
            return Err(AppError::not_found(format!("Folder {folder_id} not found")));
        }
        match self.tree.get_file_by_folder_and_name(folder_id, name).await? {
            Some(_) if !overwrite => Err(AppError::conflict(format!(
                "A file named '{name}' already exists in this folder"
            ))),
            Some(existing) => AccessGuard::authorize_mutation(&existing, owner_id),
            None => Ok(()),
        }
    }

    /// Register `file`, whose blob is already written.
    ///
    /// On any failure the new blob is pruned, so a refused registration
    /// leaves no trace in storage.
    pub async fn register(&self, file: File, overwrite: bool) -> AppResult<File> {
        match self.insert_or_replace(&file, overwrite).await {
            Ok((registered, replaced)) => {
                if let Some(old) = replaced {
                    self.prune(&old).await;
                    info!(
                        file_id = %registered.id,
                        replaced_id = %old.id,
                        name = %registered.name,
                        "File replaced"
                    );
                } else {
                    info!(
                        file_id = %registered.id,
                        folder_id = %registered.folder_id,
                        name = %registered.name,
                        size = registered.size_bytes,
                        "File registered"
                    );
                }
                Ok(registered)
            }
            Err(e) => {
                self.prune(&file).await;
                Err(e)
            }
        }
    }

    async fn insert_or_replace(
        &self,
        file: &File,
        overwrite: bool,
    ) -> AppResult<(File, Option<File>)> {
        let existing = self
            .tree
            .get_file_by_folder_and_name(&file.folder_id, &file.name)
            .await?;

        match existing {
            Some(_) if !overwrite => Err(AppError::conflict(format!(
                "A file named '{}' already exists in this folder",
                file.name
            ))),
            Some(old) => {
                AccessGuard::authorize_mutation(&old, &file.owner_id)?;
                let registered = self.tree.replace_file(&old.id, file).await?;
                Ok((registered, Some(old)))
            }
            None => Ok((self.tree.insert_file(file).await?, None)),
        }
    }

    async fn prune(&self, file: &File) {
        if let Err(e) = self.storage.delete(&file.storage_path).await {
            warn!(file_id = %file.id, path = %file.storage_path, error = %e, "Failed to prune blob");
        }
    }
}
