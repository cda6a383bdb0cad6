//! Ancestor-chain resolution for breadcrumbs.

use std::sync::Arc;

use simplehost_core::error::AppError;
use simplehost_core::result::AppResult;
use simplehost_core::types::FolderId;
use simplehost_database::TreeStore;
use simplehost_entity::folder::model::Folder;

/// Walks parent links from a folder up to the root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    /// Tree store.
    tree: Arc<dyn TreeStore>,
    /// Longest chain accepted before the tree is declared corrupt.
    max_depth: usize,
}

impl PathResolver {
    /// Creates a new path resolver.
    pub fn new(tree: Arc<dyn TreeStore>, max_depth: usize) -> Self {
        Self { tree, max_depth }
    }

    /// Return the folders from the root down to `folder_id`, inclusive.
    ///
    /// A missing link anywhere on the chain is `NotFound`; a chain longer
    /// than the depth limit is `Internal`, since only a cycle produces one.
    pub async fn resolve_path(&self, folder_id: &FolderId) -> AppResult<Vec<Folder>> {
        let mut chain = Vec::new();
        let mut cursor = Some(folder_id.clone());

        while let Some(id) = cursor {
            if chain.len() >= self.max_depth {
                tracing::error!(folder_id = %folder_id, max_depth = self.max_depth, "Ancestor walk exceeded depth limit");
                return Err(AppError::internal(format!(
                    "Folder {folder_id} has more than {} ancestors; the tree is corrupt",
                    self.max_depth
                )));
            }

            let folder = self.tree.get_folder(&id).await?.ok_or_else(|| {
                if id == *folder_id {
                    AppError::not_found(format!("Folder {id} not found"))
                } else {
                    AppError::not_found(format!("Ancestor folder {id} of {folder_id} not found"))
                }
            })?;

            cursor = if folder.is_root() {
                None
            } else {
                folder.parent_id.clone()
            };
            chain.push(folder);
        }

        chain.reverse();
        Ok(chain)
    }
}
