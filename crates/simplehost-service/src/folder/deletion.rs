//! Folder deletion: promote the children, or cascade through the subtree.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use simplehost_core::config::{CascadeOwnership, TreeConfig};
use simplehost_core::error::AppError;
use simplehost_core::result::AppResult;
use simplehost_core::traits::storage::StorageProvider;
use simplehost_core::types::{FileId, FolderId};
use simplehost_database::TreeStore;
use simplehost_entity::file::File;
use simplehost_entity::folder::Folder;

use crate::access::AccessGuard;
use crate::context::RequestContext;

/// What happens to a deleted folder's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Hand child folders and files to the deleted folder's parent.
    PromoteChildren,
    /// Delete every descendant folder and file.
    CascadeDelete,
}

impl DeleteMode {
    /// Wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PromoteChildren => "folder",
            Self::CascadeDelete => "all",
        }
    }
}

impl fmt::Display for DeleteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeleteMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "folder" | "promote" => Ok(Self::PromoteChildren),
            "all" | "cascade" => Ok(Self::CascadeDelete),
            other => Err(AppError::validation(format!("Unknown delete mode '{other}'"))),
        }
    }
}

/// Everything below a folder, gathered without visibility filtering.
#[derive(Debug, Default)]
struct Subtree {
    /// Descendant folders in breadth-first order.
    folders: Vec<Folder>,
    /// Files anywhere in the subtree, including the target's own.
    files: Vec<File>,
}

/// Deletes folders in either mode.
#[derive(Debug, Clone)]
pub struct DeletionCoordinator {
    /// Tree store.
    tree: Arc<dyn TreeStore>,
    /// Blob storage, for pruning deleted files.
    storage: Arc<dyn StorageProvider>,
    /// Descendant ownership policy for cascades.
    cascade_ownership: CascadeOwnership,
}

impl DeletionCoordinator {
    /// Creates a new deletion coordinator.
    pub fn new(
        tree: Arc<dyn TreeStore>,
        storage: Arc<dyn StorageProvider>,
        config: &TreeConfig,
    ) -> Self {
        Self {
            tree,
            storage,
            cascade_ownership: config.cascade_ownership,
        }
    }

    /// Delete `folder_id` on behalf of the requester.
    ///
    /// The root is never deletable. Only the folder's owner may delete it.
    pub async fn delete_folder(
        &self,
        ctx: &RequestContext,
        folder_id: &FolderId,
        mode: DeleteMode,
    ) -> AppResult<()> {
        if folder_id.is_root() {
            return Err(AppError::invalid_operation("The root folder cannot be deleted"));
        }

        let folder = self
            .tree
            .get_folder(folder_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Folder {folder_id} not found")))?;
        AccessGuard::authorize_mutation(&folder, &ctx.requester_id)?;

        match mode {
            DeleteMode::PromoteChildren => self.promote(ctx, &folder).await,
            DeleteMode::CascadeDelete => self.cascade(ctx, &folder).await,
        }
    }

    async fn promote(&self, ctx: &RequestContext, folder: &Folder) -> AppResult<()> {
        let parent_id = folder.parent_id.clone().ok_or_else(|| {
            AppError::invalid_operation(format!("Folder {} has no parent to promote into", folder.id))
        })?;

        self.tree.promote_children(&folder.id, &parent_id).await?;

        info!(
            user_id = %ctx.requester_id,
            folder_id = %folder.id,
            parent_id = %parent_id,
            "Folder deleted, children promoted"
        );
        Ok(())
    }

    async fn cascade(&self, ctx: &RequestContext, folder: &Folder) -> AppResult<()> {
        let subtree = self.collect_subtree(&folder.id).await?;

        if self.cascade_ownership == CascadeOwnership::Strict {
            let foreign_folder = subtree
                .folders
                .iter()
                .any(|f| !AccessGuard::can_mutate(f, &ctx.requester_id));
            let foreign_file = subtree
                .files
                .iter()
                .any(|f| !AccessGuard::can_mutate(f, &ctx.requester_id));
            if foreign_folder || foreign_file {
                return Err(AppError::forbidden(format!(
                    "Folder {} contains items owned by other users",
                    folder.id
                )));
            }
        }

        let file_ids: Vec<FileId> = subtree.files.iter().map(|f| f.id.clone()).collect();
        // Breadth-first order reversed puts every folder before its parent.
        let mut folder_ids: Vec<FolderId> =
            subtree.folders.iter().rev().map(|f| f.id.clone()).collect();
        folder_ids.push(folder.id.clone());

        self.tree.delete_subtree(&file_ids, &folder_ids).await?;

        for file in &subtree.files {
            if let Err(e) = self.storage.delete(&file.storage_path).await {
                warn!(file_id = %file.id, path = %file.storage_path, error = %e, "Failed to prune blob");
            }
        }

        info!(
            user_id = %ctx.requester_id,
            folder_id = %folder.id,
            folders = folder_ids.len(),
            files = file_ids.len(),
            "Folder subtree deleted"
        );
        Ok(())
    }

    /// Breadth-first walk of everything under `root_id`.
    ///
    /// Unfiltered: private and foreign descendants are collected too.
    async fn collect_subtree(&self, root_id: &FolderId) -> AppResult<Subtree> {
        let mut subtree = Subtree::default();
        let mut queue = VecDeque::from([root_id.clone()]);

        while let Some(id) = queue.pop_front() {
            let (folders, files) = self.tree.list_children(&id).await?;
            subtree.files.extend(files);
            for child in folders {
                queue.push_back(child.id.clone());
                subtree.folders.push(child);
            }
        }

        Ok(subtree)
    }
}

#[cfg(test)]
mod tests {
    use simplehost_core::error::ErrorKind;
    use simplehost_core::types::UserId;

    use super::*;
    use crate::test_support::Harness;

    #[test]
    fn test_parse_mode() {
        assert_eq!("folder".parse::<DeleteMode>().unwrap(), DeleteMode::PromoteChildren);
        assert_eq!("ALL".parse::<DeleteMode>().unwrap(), DeleteMode::CascadeDelete);
        assert_eq!("cascade".parse::<DeleteMode>().unwrap(), DeleteMode::CascadeDelete);
        assert_eq!(
            "nuke".parse::<DeleteMode>().unwrap_err().kind,
            ErrorKind::Validation
        );
        assert_eq!(DeleteMode::CascadeDelete.to_string(), "all");
    }

    async fn folder(h: &Harness, name: &str, parent: &FolderId, owner: &str) -> Folder {
        h.tree
            .insert_folder(&Folder::new_child(name, parent.clone(), UserId::from(owner)))
            .await
            .unwrap()
    }

    async fn file(h: &Harness, name: &str, folder: &FolderId, owner: &str) -> File {
        let file = File::new(FileId::new(), name, folder.clone(), UserId::from(owner), 1);
        h.storage
            .write(&file.storage_path, bytes::Bytes::from("x"))
            .await
            .unwrap();
        h.tree.insert_file(&file).await.unwrap()
    }

    #[tokio::test]
    async fn test_root_is_never_deletable() {
        let h = Harness::new().await;
        let svc = h.deletion(CascadeOwnership::Permissive);
        for mode in [DeleteMode::PromoteChildren, DeleteMode::CascadeDelete] {
            let err = svc
                .delete_folder(&RequestContext::new("system"), &FolderId::root(), mode)
                .await
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidOperation);
        }
    }

    #[tokio::test]
    async fn test_missing_and_foreign_targets() {
        let h = Harness::new().await;
        let svc = h.deletion(CascadeOwnership::Permissive);
        let ctx = RequestContext::new("u1");
        let err = svc
            .delete_folder(&ctx, &FolderId::from("nope"), DeleteMode::CascadeDelete)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        let theirs = folder(&h, "theirs", &FolderId::root(), "u2").await;
        let err = svc
            .delete_folder(&ctx, &theirs.id, DeleteMode::PromoteChildren)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_promote_children() {
        let h = Harness::new().await;
        let svc = h.deletion(CascadeOwnership::Permissive);
        let ctx = RequestContext::new("u1");
        let parent = folder(&h, "P", &FolderId::root(), "u1").await;
        let target = folder(&h, "T", &parent.id, "u1").await;
        let f1 = folder(&h, "F1", &target.id, "u1").await;
        let f2 = folder(&h, "F2", &target.id, "u2").await;
        let x = file(&h, "x", &target.id, "u1").await;

        svc.delete_folder(&ctx, &target.id, DeleteMode::PromoteChildren)
            .await
            .unwrap();

        assert!(h.tree.get_folder(&target.id).await.unwrap().is_none());
        for id in [&f1.id, &f2.id] {
            let f = h.tree.get_folder(id).await.unwrap().unwrap();
            assert_eq!(f.parent_id, Some(parent.id.clone()));
        }
        let x = h.tree.get_file(&x.id).await.unwrap().unwrap();
        assert_eq!(x.folder_id, parent.id);
        assert!(h.storage.exists(&x.storage_path).await.unwrap());
    }

    #[tokio::test]
    async fn test_promote_renames_file_taken_in_parent() {
        let h = Harness::new().await;
        let svc = h.deletion(CascadeOwnership::Permissive);
        let ctx = RequestContext::new("u1");
        let parent = folder(&h, "P", &FolderId::root(), "u1").await;
        let kept = file(&h, "a.txt", &parent.id, "u1").await;
        let target = folder(&h, "T", &parent.id, "u1").await;
        let promoted = file(&h, "a.txt", &target.id, "u1").await;

        svc.delete_folder(&ctx, &target.id, DeleteMode::PromoteChildren)
            .await
            .unwrap();

        assert!(h.tree.get_folder(&target.id).await.unwrap().is_none());
        let kept = h.tree.get_file(&kept.id).await.unwrap().unwrap();
        assert_eq!((kept.folder_id.clone(), kept.name.as_str()), (parent.id.clone(), "a.txt"));
        let promoted = h.tree.get_file(&promoted.id).await.unwrap().unwrap();
        assert_eq!(promoted.folder_id, parent.id);
        assert_eq!(promoted.name, "a (1).txt");
        let (_, files) = h.tree.list_children(&parent.id).await.unwrap();
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_cascade_removes_subtree_and_blobs() {
        let h = Harness::new().await;
        let svc = h.deletion(CascadeOwnership::Permissive);
        let ctx = RequestContext::new("u1");
        let target = folder(&h, "T", &FolderId::root(), "u1").await;
        let a = folder(&h, "A", &target.id, "u1").await;
        let b = folder(&h, "B", &a.id, "u2").await;
        let c = folder(&h, "C", &b.id, "u1").await;
        let f_top = file(&h, "top", &target.id, "u1").await;
        let f_deep = file(&h, "deep", &c.id, "u2").await;
        h.tree.set_file_private(&f_deep.id, true).await.unwrap();

        svc.delete_folder(&ctx, &target.id, DeleteMode::CascadeDelete)
            .await
            .unwrap();

        for id in [&target.id, &a.id, &b.id, &c.id] {
            assert!(h.tree.get_folder(id).await.unwrap().is_none());
        }
        for f in [&f_top, &f_deep] {
            assert!(h.tree.get_file(&f.id).await.unwrap().is_none());
            assert!(!h.storage.exists(&f.storage_path).await.unwrap());
        }
        let (folders, _) = h.tree.list_children(&FolderId::root()).await.unwrap();
        assert!(folders.is_empty());
    }

    #[tokio::test]
    async fn test_strict_cascade_refuses_foreign_descendants() {
        let h = Harness::new().await;
        let svc = h.deletion(CascadeOwnership::Strict);
        let ctx = RequestContext::new("u1");
        let target = folder(&h, "T", &FolderId::root(), "u1").await;
        let inner = folder(&h, "I", &target.id, "u1").await;
        file(&h, "theirs", &inner.id, "u2").await;

        let err = svc
            .delete_folder(&ctx, &target.id, DeleteMode::CascadeDelete)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
        assert!(h.tree.get_folder(&inner.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_strict_cascade_allows_own_subtree() {
        let h = Harness::new().await;
        let svc = h.deletion(CascadeOwnership::Strict);
        let ctx = RequestContext::new("u1");
        let target = folder(&h, "T", &FolderId::root(), "u1").await;
        folder(&h, "I", &target.id, "u1").await;

        svc.delete_folder(&ctx, &target.id, DeleteMode::CascadeDelete)
            .await
            .unwrap();
        assert!(h.tree.get_folder(&target.id).await.unwrap().is_none());
    }
}
