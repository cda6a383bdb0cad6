//! Bulk ingest of files carrying relative directory paths.

use std::collections::HashMap;

use bytes::Bytes;

use simplehost_core::error::AppError;
use simplehost_core::result::AppResult;
use simplehost_core::types::{FolderId, UserId};
use simplehost_database::TreeStore;
use simplehost_entity::folder::Folder;

use crate::naming::validate_name;

/// One file of a bulk upload.
#[derive(Debug, Clone)]
pub struct BulkFile {
    /// Path relative to the upload's base folder, e.g. `photos/2024/a.jpg`.
    /// A bare name lands directly in the base folder.
    pub relative_path: String,
    /// File contents.
    pub data: Bytes,
}

impl BulkFile {
    /// Creates a bulk file entry.
    pub fn new(relative_path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            relative_path: relative_path.into(),
            data: data.into(),
        }
    }
}

/// Split a relative path into its directory segments and file name.
///
/// Both `/` and `\` separate segments; empty and `.` segments are skipped
/// and `..` is rejected.
pub fn split_relative_path(path: &str) -> AppResult<(Vec<&str>, String)> {
    let mut segments = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment.trim() {
            "" | "." => continue,
            ".." => {
                return Err(AppError::validation(format!(
                    "Relative path '{path}' must not contain '..'"
                )));
            }
            _ => segments.push(segment),
        }
    }
    let name = segments
        .pop()
        .ok_or_else(|| AppError::validation(format!("Relative path '{path}' has no file name")))?;
    Ok((segments, validate_name(name)?))
}

/// Folders created during one bulk call, keyed by their path below the
/// base folder.
///
/// Scoped to a single call: two batches uploading the same directory tree
/// each create their own folders.
#[derive(Debug)]
pub struct IngestBatch {
    base: FolderId,
    owner: UserId,
    created: HashMap<String, FolderId>,
}

impl IngestBatch {
    /// Start a batch rooted at `base` for files owned by `owner`.
    pub fn new(base: FolderId, owner: UserId) -> Self {
        Self {
            base,
            owner,
            created: HashMap::new(),
        }
    }

    /// Number of folders this batch has created.
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    /// Return the folder for `segments` below the base, creating any
    /// missing prefix exactly once per batch.
    pub async fn materialize_folder_chain(
        &mut self,
        tree: &dyn TreeStore,
        segments: &[&str],
    ) -> AppResult<FolderId> {
        let mut cursor = self.base.clone();
        let mut path_so_far = String::new();

        for segment in segments {
            let name = validate_name(segment)?;
            if !path_so_far.is_empty() {
                path_so_far.push('/');
            }
            path_so_far.push_str(&name);

            cursor = match self.created.get(&path_so_far) {
                Some(id) => id.clone(),
                None => {
                    let folder = Folder::new_child(name, cursor, self.owner.clone());
                    let folder = tree.insert_folder(&folder).await?;
                    tracing::debug!(folder_id = %folder.id, path = %path_so_far, "Created folder for bulk upload");
                    self.created.insert(path_so_far.clone(), folder.id.clone());
                    folder.id
                }
            };
        }

        Ok(cursor)
    }
}
