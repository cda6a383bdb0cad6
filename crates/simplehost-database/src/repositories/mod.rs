//! Repository implementations for the folder tree.

pub mod file;
pub mod folder;

pub use file::FileRepository;
pub use folder::FolderRepository;

use simplehost_core::error::{AppError, ErrorKind};

/// Map a write failure, turning constraint violations into domain kinds.
///
/// A unique violation is a name collision (`Conflict`); a foreign key
/// violation means the referenced folder is gone (`NotFound`).
pub(crate) fn map_write_error(err: sqlx::Error, context: &str) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return AppError::conflict(format!("{context}: name already taken"));
        }
        if db_err.is_foreign_key_violation() {
            return AppError::not_found(format!("{context}: referenced folder does not exist"));
        }
    }
    AppError::with_source(ErrorKind::Database, context.to_string(), err)
}
