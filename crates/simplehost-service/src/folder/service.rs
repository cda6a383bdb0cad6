//! Folder listing, creation, and visibility.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use simplehost_core::config::TreeConfig;
use simplehost_core::error::AppError;
use simplehost_core::result::AppResult;
use simplehost_core::types::FolderId;
use simplehost_database::TreeStore;
use simplehost_entity::file::FileEntry;
use simplehost_entity::folder::{Folder, FolderEntry, FolderListing};

use crate::access::AccessGuard;
use crate::context::RequestContext;
use crate::folder::path::PathResolver;
use crate::naming::validate_name;

/// Manages folder reads and the non-destructive folder mutations.
#[derive(Debug, Clone)]
pub struct FolderService {
    /// Tree store.
    tree: Arc<dyn TreeStore>,
    /// Breadcrumb resolver.
    paths: PathResolver,
}

/// Request to create a new folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFolderRequest {
    /// Parent folder ID (the root when omitted).
    #[serde(default)]
    pub parent_id: Option<FolderId>,
    /// Folder name.
    pub name: String,
    /// Whether the folder is visible to its owner only.
    #[serde(default)]
    pub is_private: bool,
}

impl FolderService {
    /// Creates a new folder service.
    pub fn new(tree: Arc<dyn TreeStore>, config: &TreeConfig) -> Self {
        let paths = PathResolver::new(Arc::clone(&tree), config.max_depth);
        Self { tree, paths }
    }

    /// Create the root folder if it does not exist yet.
    pub async fn ensure_root(&self) -> AppResult<Folder> {
        let root = self.tree.ensure_root().await?;
        info!(folder_id = %root.id, "Root folder ready");
        Ok(root)
    }

    /// Gets a folder the requester is allowed to see.
    pub async fn get_folder(&self, ctx: &RequestContext, folder_id: &FolderId) -> AppResult<Folder> {
        let folder = self
            .tree
            .get_folder(folder_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Folder {folder_id} not found")))?;
        AccessGuard::authorize_view(&folder, &ctx.requester_id)?;
        Ok(folder)
    }

    /// Lists the children of a folder that the requester may see.
    pub async fn list_children(
        &self,
        ctx: &RequestContext,
        folder_id: Option<FolderId>,
    ) -> AppResult<FolderListing> {
        let folder_id = FolderId::or_root(folder_id);
        self.get_folder(ctx, &folder_id).await?;

        let (folders, files) = self.tree.list_children(&folder_id).await?;
        let requester = &ctx.requester_id;

        Ok(FolderListing {
            folders: AccessGuard::filter_visible(folders, requester)
                .into_iter()
                .map(|f| FolderEntry::for_requester(f, requester))
                .collect(),
            files: AccessGuard::filter_visible(files, requester)
                .into_iter()
                .map(|f| FileEntry::for_requester(f, requester))
                .collect(),
        })
    }

    /// The folders from the root down to `folder_id`.
    pub async fn breadcrumbs(&self, folder_id: Option<FolderId>) -> AppResult<Vec<Folder>> {
        self.paths.resolve_path(&FolderId::or_root(folder_id)).await
    }

    /// Creates a new folder owned by the requester.
    ///
    /// Sibling folders may not share a name.
    pub async fn create_folder(
        &self,
        ctx: &RequestContext,
        req: CreateFolderRequest,
    ) -> AppResult<Folder> {
        let name = validate_name(&req.name)?;
        let parent_id = FolderId::or_root(req.parent_id);
        self.get_folder(ctx, &parent_id).await?;

        let folder = Folder::new_child(name, parent_id, ctx.requester_id.clone())
            .with_private(req.is_private);
        let folder = self.tree.insert_folder_unique(&folder).await?;

        info!(
            user_id = %ctx.requester_id,
            folder_id = %folder.id,
            parent_id = ?folder.parent_id,
            name = %folder.name,
            "Folder created"
        );

        Ok(folder)
    }

    /// Marks a folder private or shared. Owner only.
    pub async fn set_visibility(
        &self,
        ctx: &RequestContext,
        folder_id: &FolderId,
        is_private: bool,
    ) -> AppResult<Folder> {
        if folder_id.is_root() {
            return Err(AppError::invalid_operation(
                "The root folder's visibility cannot change",
            ));
        }
        let folder = self
            .tree
            .get_folder(folder_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Folder {folder_id} not found")))?;
        AccessGuard::authorize_mutation(&folder, &ctx.requester_id)?;

        let folder = self.tree.set_folder_private(folder_id, is_private).await?;
        info!(
            user_id = %ctx.requester_id,
            folder_id = %folder_id,
            is_private,
            "Folder visibility changed"
        );
        Ok(folder)
    }
}
