//! File repository implementation.

use sqlx::SqlitePool;

use simplehost_core::error::{AppError, ErrorKind};
use simplehost_core::result::AppResult;
use simplehost_core::types::{FileId, FolderId};
use simplehost_entity::file::model::File;

use super::map_write_error;

const INSERT_FILE: &str = "INSERT INTO files \
     (id, name, folder_id, storage_path, owner_id, uploaded_at, is_private, size_bytes) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

/// Repository for file rows.
#[derive(Debug, Clone)]
pub struct FileRepository {
    pool: SqlitePool,
}

impl FileRepository {
    /// Create a new file repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a file by ID.
    pub async fn find_by_id(&self, id: &FileId) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find file", e))
    }

    /// List the files of a folder, ordered by name.
    pub async fn find_by_folder(&self, folder_id: &FolderId) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE folder_id = ? ORDER BY name ASC")
            .bind(folder_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list files", e))
    }

    /// Find a file by folder ID and name (for duplicate checking).
    pub async fn find_by_folder_and_name(
        &self,
        folder_id: &FolderId,
        name: &str,
    ) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE folder_id = ? AND name = ?")
            .bind(folder_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find file by name", e)
            })
    }

    /// Insert a file row. A taken `(folder_id, name)` slot is a `Conflict`.
    pub async fn create(&self, file: &File) -> AppResult<File> {
        sqlx::query(INSERT_FILE)
            .bind(&file.id)
            .bind(&file.name)
            .bind(&file.folder_id)
            .bind(&file.storage_path)
            .bind(&file.owner_id)
            .bind(file.uploaded_at)
            .bind(file.is_private)
            .bind(file.size_bytes)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, &format!("Failed to register file '{}'", file.name)))?;
        Ok(file.clone())
    }

    /// Swap the row `old_id` for `file` in one transaction.
    pub async fn replace(&self, old_id: &FileId, file: &File) -> AppResult<File> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(old_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete replaced file", e)
            })?;

        sqlx::query(INSERT_FILE)
            .bind(&file.id)
            .bind(&file.name)
            .bind(&file.folder_id)
            .bind(&file.storage_path)
            .bind(&file.owner_id)
            .bind(file.uploaded_at)
            .bind(file.is_private)
            .bind(file.size_bytes)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, &format!("Failed to register file '{}'", file.name)))?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit file replacement", e)
        })?;
        Ok(file.clone())
    }

    /// Set the private flag of a file.
    pub async fn set_private(&self, id: &FileId, is_private: bool) -> AppResult<File> {
        sqlx::query_as::<_, File>("UPDATE files SET is_private = ? WHERE id = ? RETURNING *")
            .bind(is_private)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update file", e))?
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))
    }

    /// Move every file of `folder_id` into `new_folder_id`.
    pub async fn reparent_children(
        &self,
        folder_id: &FolderId,
        new_folder_id: &FolderId,
    ) -> AppResult<u64> {
        let result = sqlx::query("UPDATE files SET folder_id = ? WHERE folder_id = ?")
            .bind(new_folder_id)
            .bind(folder_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "Failed to reparent files"))?;
        Ok(result.rows_affected())
    }

    /// Delete a file record.
    pub async fn delete(&self, id: &FileId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete file", e))?;
        Ok(result.rows_affected() > 0)
    }
}
