//! The tree store: persistence of folders and files.
//!
//! Services depend on `Arc<dyn TreeStore>` so tests and alternative
//! backends can be substituted. [`SqlTreeStore`] is the SQLite
//! implementation built from the folder and file repositories.

use async_trait::async_trait;
use sqlx::SqlitePool;

use simplehost_core::result::AppResult;
use simplehost_core::types::{FileId, FolderId};
use simplehost_entity::file::model::File;
use simplehost_entity::folder::model::Folder;

use crate::repositories::{FileRepository, FolderRepository};

/// Durable store of folder and file rows.
///
/// Single-row operations map a taken file slot to `Conflict` and a missing
/// parent folder to `NotFound`; every other failure is `Database`. The
/// composite operations run inside one transaction each.
#[async_trait]
pub trait TreeStore: Send + Sync + std::fmt::Debug {
    /// Insert a folder. Sibling names are not checked.
    async fn insert_folder(&self, folder: &Folder) -> AppResult<Folder>;

    /// Insert a folder unless its parent already has a child of that name.
    async fn insert_folder_unique(&self, folder: &Folder) -> AppResult<Folder>;

    /// Insert a file row.
    async fn insert_file(&self, file: &File) -> AppResult<File>;

    /// Look up a folder.
    async fn get_folder(&self, id: &FolderId) -> AppResult<Option<Folder>>;

    /// Look up a file.
    async fn get_file(&self, id: &FileId) -> AppResult<Option<File>>;

    /// Look up a file by name within one folder.
    async fn get_file_by_folder_and_name(
        &self,
        folder_id: &FolderId,
        name: &str,
    ) -> AppResult<Option<File>>;

    /// Direct children of a folder, unfiltered.
    async fn list_children(&self, folder_id: &FolderId) -> AppResult<(Vec<Folder>, Vec<File>)>;

    /// Delete one folder row; returns whether it existed.
    async fn delete_folder(&self, id: &FolderId) -> AppResult<bool>;

    /// Delete one file row; returns whether it existed.
    async fn delete_file(&self, id: &FileId) -> AppResult<bool>;

    /// Move child folders of `folder_id` under `new_parent_id`.
    async fn reparent_folder_children(
        &self,
        folder_id: &FolderId,
        new_parent_id: &FolderId,
    ) -> AppResult<u64>;

    /// Move files of `folder_id` into `new_parent_id`.
    async fn reparent_file_children(
        &self,
        folder_id: &FolderId,
        new_parent_id: &FolderId,
    ) -> AppResult<u64>;

    /// Replace the row `old_id` with `file` atomically.
    async fn replace_file(&self, old_id: &FileId, file: &File) -> AppResult<File>;

    /// Reparent both kinds of children and delete the folder atomically.
    async fn promote_children(&self, folder_id: &FolderId, new_parent_id: &FolderId)
    -> AppResult<()>;

    /// Delete files, then folders in the given order, atomically.
    async fn delete_subtree(&self, file_ids: &[FileId], folder_ids: &[FolderId]) -> AppResult<()>;

    /// Set a folder's private flag.
    async fn set_folder_private(&self, id: &FolderId, is_private: bool) -> AppResult<Folder>;

    /// Set a file's private flag.
    async fn set_file_private(&self, id: &FileId, is_private: bool) -> AppResult<File>;

    /// Create the root folder if absent.
    async fn ensure_root(&self) -> AppResult<Folder>;
}

/// SQLite-backed [`TreeStore`].
#[derive(Debug, Clone)]
pub struct SqlTreeStore {
    folders: FolderRepository,
    files: FileRepository,
}

impl SqlTreeStore {
    /// Build a store over a migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            folders: FolderRepository::new(pool.clone()),
            files: FileRepository::new(pool),
        }
    }
}

#[async_trait]
impl TreeStore for SqlTreeStore {
    async fn insert_folder(&self, folder: &Folder) -> AppResult<Folder> {
        self.folders.create(folder).await
    }

    async fn insert_folder_unique(&self, folder: &Folder) -> AppResult<Folder> {
        self.folders.create_unique(folder).await
    }

    async fn insert_file(&self, file: &File) -> AppResult<File> {
        self.files.create(file).await
    }

    async fn get_folder(&self, id: &FolderId) -> AppResult<Option<Folder>> {
        self.folders.find_by_id(id).await
    }

    async fn get_file(&self, id: &FileId) -> AppResult<Option<File>> {
        self.files.find_by_id(id).await
    }

    async fn get_file_by_folder_and_name(
        &self,
        folder_id: &FolderId,
        name: &str,
    ) -> AppResult<Option<File>> {
        self.files.find_by_folder_and_name(folder_id, name).await
    }

    async fn list_children(&self, folder_id: &FolderId) -> AppResult<(Vec<Folder>, Vec<File>)> {
        let folders = self.folders.find_children(folder_id).await?;
        let files = self.files.find_by_folder(folder_id).await?;
        Ok((folders, files))
    }

    async fn delete_folder(&self, id: &FolderId) -> AppResult<bool> {
        self.folders.delete(id).await
    }

    async fn delete_file(&self, id: &FileId) -> AppResult<bool> {
        self.files.delete(id).await
    }

    async fn reparent_folder_children(
        &self,
        folder_id: &FolderId,
        new_parent_id: &FolderId,
    ) -> AppResult<u64> {
        self.folders.reparent_children(folder_id, new_parent_id).await
    }

    async fn reparent_file_children(
        &self,
        folder_id: &FolderId,
        new_parent_id: &FolderId,
    ) -> AppResult<u64> {
        self.files.reparent_children(folder_id, new_parent_id).await
    }

    async fn replace_file(&self, old_id: &FileId, file: &File) -> AppResult<File> {
        self.files.replace(old_id, file).await
    }

    async fn promote_children(
        &self,
        folder_id: &FolderId,
        new_parent_id: &FolderId,
    ) -> AppResult<()> {
        self.folders.promote_children(folder_id, new_parent_id).await
    }

    async fn delete_subtree(&self, file_ids: &[FileId], folder_ids: &[FolderId]) -> AppResult<()> {
        self.folders.delete_subtree(file_ids, folder_ids).await
    }

    async fn set_folder_private(&self, id: &FolderId, is_private: bool) -> AppResult<Folder> {
        self.folders.set_private(id, is_private).await
    }

    async fn set_file_private(&self, id: &FileId, is_private: bool) -> AppResult<File> {
        self.files.set_private(id, is_private).await
    }

    async fn ensure_root(&self) -> AppResult<Folder> {
        self.folders.ensure_root().await
    }
}

#[cfg(test)]
mod tests {
    use simplehost_core::config::DatabaseConfig;
    use simplehost_core::error::ErrorKind;
    use simplehost_core::types::UserId;

    use super::*;
    use crate::connection::DatabasePool;
    use crate::migration::run_migrations;

    async fn store() -> SqlTreeStore {
        let db = DatabasePool::connect(&DatabaseConfig::new("sqlite::memory:"))
            .await
            .unwrap();
        run_migrations(db.pool()).await.unwrap();
        let store = SqlTreeStore::new(db.into_pool());
        store.ensure_root().await.unwrap();
        store
    }

    fn alice() -> UserId {
        UserId::from("alice")
    }

    fn file_in(folder: &FolderId, name: &str) -> File {
        File::new(FileId::new(), name, folder.clone(), alice(), 3)
    }

    #[tokio::test]
    async fn test_ensure_root_is_idempotent() {
        let store = store().await;
        let again = store.ensure_root().await.unwrap();
        assert_eq!(again, Folder::root());
        let (folders, files) = store.list_children(&FolderId::root()).await.unwrap();
        assert!(folders.is_empty());
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_folder_and_file_round_trip() {
        let store = store().await;
        let docs = Folder::new_child("docs", FolderId::root(), alice());
        store.insert_folder(&docs).await.unwrap();
        let file = file_in(&docs.id, "a.txt");
        store.insert_file(&file).await.unwrap();

        assert_eq!(store.get_folder(&docs.id).await.unwrap(), Some(docs.clone()));
        let loaded = store.get_file(&file.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "a.txt");
        assert_eq!(loaded.size_bytes, 3);
        assert_eq!(loaded.uploaded_at.timestamp(), file.uploaded_at.timestamp());

        let by_name = store
            .get_file_by_folder_and_name(&docs.id, "a.txt")
            .await
            .unwrap();
        assert_eq!(by_name.map(|f| f.id), Some(file.id));
        assert!(
            store
                .get_file_by_folder_and_name(&FolderId::root(), "a.txt")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_duplicate_file_slot_is_conflict() {
        let store = store().await;
        store.insert_file(&file_in(&FolderId::root(), "a.txt")).await.unwrap();
        let err = store
            .insert_file(&file_in(&FolderId::root(), "a.txt"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_missing_parent_is_not_found() {
        let store = store().await;
        let orphan = Folder::new_child("x", FolderId::from("nope"), alice());
        let err = store.insert_folder(&orphan).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        let err = store
            .insert_file(&file_in(&FolderId::from("nope"), "a"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_insert_folder_unique_refuses_sibling_name() {
        let store = store().await;
        let first = Folder::new_child("docs", FolderId::root(), alice());
        store.insert_folder_unique(&first).await.unwrap();
        let second = Folder::new_child("docs", FolderId::root(), alice());
        let err = store.insert_folder_unique(&second).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        // Plain inserts allow the duplicate, as bulk ingest does.
        store.insert_folder(&second).await.unwrap();
        let (folders, _) = store.list_children(&FolderId::root()).await.unwrap();
        assert_eq!(folders.len(), 2);
    }

    #[tokio::test]
    async fn test_replace_file_keeps_one_row() {
        let store = store().await;
        let old = file_in(&FolderId::root(), "a.txt");
        store.insert_file(&old).await.unwrap();
        let new = file_in(&FolderId::root(), "a.txt");
        store.replace_file(&old.id, &new).await.unwrap();

        let (_, files) = store.list_children(&FolderId::root()).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, new.id);
        assert!(store.get_file(&old.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_promote_children_moves_both_kinds() {
        let store = store().await;
        let a = Folder::new_child("a", FolderId::root(), alice());
        let b = Folder::new_child("b", a.id.clone(), alice());
        store.insert_folder(&a).await.unwrap();
        store.insert_folder(&b).await.unwrap();
        let f = file_in(&a.id, "f.txt");
        store.insert_file(&f).await.unwrap();

        store.promote_children(&a.id, &FolderId::root()).await.unwrap();

        assert!(store.get_folder(&a.id).await.unwrap().is_none());
        let b = store.get_folder(&b.id).await.unwrap().unwrap();
        assert_eq!(b.parent_id, Some(FolderId::root()));
        let f = store.get_file(&f.id).await.unwrap().unwrap();
        assert_eq!(f.folder_id, FolderId::root());
    }

    #[tokio::test]
    async fn test_promote_children_renames_clashing_files() {
        let store = store().await;
        let a = Folder::new_child("a", FolderId::root(), alice());
        store.insert_folder(&a).await.unwrap();
        let outer = file_in(&FolderId::root(), "f.txt");
        store.insert_file(&outer).await.unwrap();
        store.insert_file(&file_in(&FolderId::root(), "f (1).txt")).await.unwrap();
        let inner = file_in(&a.id, "f.txt");
        store.insert_file(&inner).await.unwrap();

        store.promote_children(&a.id, &FolderId::root()).await.unwrap();

        assert!(store.get_folder(&a.id).await.unwrap().is_none());
        let moved = store.get_file(&inner.id).await.unwrap().unwrap();
        assert_eq!(moved.folder_id, FolderId::root());
        assert_eq!(moved.name, "f (2).txt");
        assert_eq!(store.get_file(&outer.id).await.unwrap().unwrap().name, "f.txt");
    }

    #[tokio::test]
    async fn test_delete_non_empty_folder_is_refused() {
        let store = store().await;
        let a = Folder::new_child("a", FolderId::root(), alice());
        store.insert_folder(&a).await.unwrap();
        store.insert_file(&file_in(&a.id, "f")).await.unwrap();
        let err = store.delete_folder(&a.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOperation);
    }

    #[tokio::test]
    async fn test_delete_subtree_removes_everything() {
        let store = store().await;
        let a = Folder::new_child("a", FolderId::root(), alice());
        let b = Folder::new_child("b", a.id.clone(), alice());
        store.insert_folder(&a).await.unwrap();
        store.insert_folder(&b).await.unwrap();
        let f1 = file_in(&a.id, "1");
        let f2 = file_in(&b.id, "2");
        store.insert_file(&f1).await.unwrap();
        store.insert_file(&f2).await.unwrap();

        store
            .delete_subtree(
                &[f1.id.clone(), f2.id.clone()],
                &[b.id.clone(), a.id.clone()],
            )
            .await
            .unwrap();

        assert!(store.get_folder(&a.id).await.unwrap().is_none());
        assert!(store.get_folder(&b.id).await.unwrap().is_none());
        assert!(store.get_file(&f2.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_subtree_wrong_order_rolls_back() {
        let store = store().await;
        let a = Folder::new_child("a", FolderId::root(), alice());
        let b = Folder::new_child("b", a.id.clone(), alice());
        store.insert_folder(&a).await.unwrap();
        store.insert_folder(&b).await.unwrap();

        let err = store
            .delete_subtree(&[], &[a.id.clone(), b.id.clone()])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOperation);
        assert!(store.get_folder(&a.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_visibility_toggles() {
        let store = store().await;
        let a = Folder::new_child("a", FolderId::root(), alice());
        store.insert_folder(&a).await.unwrap();
        let f = file_in(&a.id, "f");
        store.insert_file(&f).await.unwrap();

        assert!(store.set_folder_private(&a.id, true).await.unwrap().is_private);
        assert!(store.set_file_private(&f.id, true).await.unwrap().is_private);
        let err = store
            .set_file_private(&FileId::from("missing"), true)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_separate_reparent_operations() {
        let store = store().await;
        let a = Folder::new_child("a", FolderId::root(), alice());
        let b = Folder::new_child("b", a.id.clone(), alice());
        store.insert_folder(&a).await.unwrap();
        store.insert_folder(&b).await.unwrap();
        store.insert_file(&file_in(&a.id, "f")).await.unwrap();

        assert_eq!(
            store
                .reparent_folder_children(&a.id, &FolderId::root())
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .reparent_file_children(&a.id, &FolderId::root())
                .await
                .unwrap(),
            1
        );
        assert!(store.delete_folder(&a.id).await.unwrap());
        assert!(!store.delete_folder(&a.id).await.unwrap());
    }
}
