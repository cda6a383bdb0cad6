//! Folder repository implementation.

use sqlx::{SqliteConnection, SqlitePool};

use simplehost_core::error::{AppError, ErrorKind};
use simplehost_core::result::AppResult;
use simplehost_core::types::{FileId, FolderId};
use simplehost_entity::folder::model::Folder;

use super::map_write_error;

/// Repository for folder rows and the multi-row folder mutations.
#[derive(Debug, Clone)]
pub struct FolderRepository {
    pool: SqlitePool,
}

impl FolderRepository {
    /// Create a new folder repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a folder by ID.
    pub async fn find_by_id(&self, id: &FolderId) -> AppResult<Option<Folder>> {
        sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find folder", e))
    }

    /// List direct child folders, ordered by name.
    pub async fn find_children(&self, parent_id: &FolderId) -> AppResult<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE parent_id = ? ORDER BY name ASC, id ASC",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list children", e))
    }

    /// Insert a folder row as given.
    pub async fn create(&self, folder: &Folder) -> AppResult<Folder> {
        sqlx::query(
            "INSERT INTO folders (id, name, parent_id, owner_id, is_private) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&folder.id)
        .bind(&folder.name)
        .bind(&folder.parent_id)
        .bind(&folder.owner_id)
        .bind(folder.is_private)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &format!("Failed to create folder '{}'", folder.name)))?;
        Ok(folder.clone())
    }

    /// Insert a folder unless its parent already has a child of that name.
    ///
    /// The existence check and the insert are one statement, so two racing
    /// creators of the same name cannot both succeed.
    pub async fn create_unique(&self, folder: &Folder) -> AppResult<Folder> {
        let result = sqlx::query(
            "INSERT INTO folders (id, name, parent_id, owner_id, is_private) \
             SELECT ?1, ?2, ?3, ?4, ?5 \
             WHERE NOT EXISTS (SELECT 1 FROM folders WHERE parent_id = ?3 AND name = ?2)",
        )
        .bind(&folder.id)
        .bind(&folder.name)
        .bind(&folder.parent_id)
        .bind(&folder.owner_id)
        .bind(folder.is_private)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &format!("Failed to create folder '{}'", folder.name)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::conflict(format!(
                "Folder '{}' already exists in this location",
                folder.name
            )));
        }
        Ok(folder.clone())
    }

    /// Create the root folder if it is absent and return it.
    pub async fn ensure_root(&self) -> AppResult<Folder> {
        let root = Folder::root();
        sqlx::query(
            "INSERT OR IGNORE INTO folders (id, name, parent_id, owner_id, is_private) \
             VALUES (?, ?, NULL, ?, ?)",
        )
        .bind(&root.id)
        .bind(&root.name)
        .bind(&root.owner_id)
        .bind(root.is_private)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create root folder", e))?;

        self.find_by_id(&root.id)
            .await?
            .ok_or_else(|| AppError::internal("Root folder missing after bootstrap"))
    }

    /// Set the private flag of a folder.
    pub async fn set_private(&self, id: &FolderId, is_private: bool) -> AppResult<Folder> {
        sqlx::query_as::<_, Folder>("UPDATE folders SET is_private = ? WHERE id = ? RETURNING *")
            .bind(is_private)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update folder", e)
            })?
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))
    }

    /// Move every direct child folder of `folder_id` under `new_parent_id`.
    pub async fn reparent_children(
        &self,
        folder_id: &FolderId,
        new_parent_id: &FolderId,
    ) -> AppResult<u64> {
        let result = sqlx::query("UPDATE folders SET parent_id = ? WHERE parent_id = ?")
            .bind(new_parent_id)
            .bind(folder_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "Failed to reparent child folders"))?;
        Ok(result.rows_affected())
    }

    /// Delete a single folder row. Fails while children still reference it.
    pub async fn delete(&self, id: &FolderId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_delete_error(e, id))?;
        Ok(result.rows_affected() > 0)
    }

    /// Hand the children of `folder_id` to `new_parent_id`, then delete it.
    ///
    /// Runs in one transaction. A promoted file whose name is already taken
    /// in the new parent is renamed to the first free `stem (n).ext`.
    pub async fn promote_children(
        &self,
        folder_id: &FolderId,
        new_parent_id: &FolderId,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        sqlx::query("UPDATE folders SET parent_id = ? WHERE parent_id = ?")
            .bind(new_parent_id)
            .bind(folder_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "Failed to promote child folders"))?;

        let moving: Vec<(String, String)> =
            sqlx::query_as("SELECT id, name FROM files WHERE folder_id = ? ORDER BY name")
                .bind(folder_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to list child files", e)
                })?;

        for (file_id, name) in moving {
            let free = free_file_name(&mut tx, new_parent_id, &name).await?;
            if free != name {
                tracing::debug!(file_id = %file_id, from = %name, to = %free, "Renaming promoted file");
            }
            sqlx::query("UPDATE files SET folder_id = ?, name = ? WHERE id = ?")
                .bind(new_parent_id)
                .bind(&free)
                .bind(&file_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_write_error(e, "Failed to promote child file"))?;
        }

        let deleted = sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(folder_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_delete_error(e, folder_id))?;

        if deleted.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Folder {folder_id} not found")));
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit promotion", e)
        })
    }

    /// Delete the given files, then the given folders in order, atomically.
    ///
    /// `folder_ids` must list descendants before their ancestors.
    pub async fn delete_subtree(&self, file_ids: &[FileId], folder_ids: &[FolderId]) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        for file_id in file_ids {
            sqlx::query("DELETE FROM files WHERE id = ?")
                .bind(file_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to delete file", e)
                })?;
        }

        for folder_id in folder_ids {
            sqlx::query("DELETE FROM folders WHERE id = ?")
                .bind(folder_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_delete_error(e, folder_id))?;
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit subtree delete", e)
        })
    }
}

/// A folder delete that trips a foreign key still has children.
fn map_delete_error(err: sqlx::Error, id: &FolderId) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_foreign_key_violation() {
            return AppError::invalid_operation(format!("Folder {id} is not empty"));
        }
    }
    AppError::with_source(ErrorKind::Database, format!("Failed to delete folder {id}"), err)
}

/// First name in `folder_id` not taken by a file: `name`, then `stem (1).ext`, ...
async fn free_file_name(
    conn: &mut SqliteConnection,
    folder_id: &FolderId,
    name: &str,
) -> AppResult<String> {
    let mut candidate = name.to_string();
    let mut n = 0u32;
    loop {
        let taken: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM files WHERE folder_id = ? AND name = ?")
                .bind(folder_id)
                .bind(&candidate)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to check file name", e)
                })?;
        if taken.is_none() {
            return Ok(candidate);
        }
        n += 1;
        candidate = numbered_name(name, n);
    }
}

fn numbered_name(name: &str, n: u32) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{} ({n}){}", &name[..dot], &name[dot..]),
        _ => format!("{name} ({n})"),
    }
}
