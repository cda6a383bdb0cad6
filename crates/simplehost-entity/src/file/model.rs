//! File entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use simplehost_core::types::{FileId, FolderId, UserId};

use crate::ownership::Owned;

/// Directory under the storage root that holds assembled blobs.
pub const BLOB_DIR: &str = "blobs";

/// A file registered in the virtual tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct File {
    /// Unique file identifier.
    pub id: FileId,
    /// The file name (including extension). Unique within its folder.
    pub name: String,
    /// The folder containing this file.
    pub folder_id: FolderId,
    /// Path of the blob within the storage provider.
    pub storage_path: String,
    /// The file owner.
    pub owner_id: UserId,
    /// When the blob was registered.
    pub uploaded_at: DateTime<Utc>,
    /// Whether only the owner may see this file.
    pub is_private: bool,
    /// Size of the blob in bytes.
    pub size_bytes: i64,
}

impl File {
    /// A new shared file row whose blob lives at the deterministic path for `id`.
    pub fn new(
        id: FileId,
        name: impl Into<String>,
        folder_id: FolderId,
        owner_id: UserId,
        size_bytes: u64,
    ) -> Self {
        let storage_path = Self::blob_path(&id);
        Self {
            id,
            name: name.into(),
            folder_id,
            storage_path,
            owner_id,
            uploaded_at: Utc::now(),
            is_private: false,
            size_bytes: size_bytes as i64,
        }
    }

    /// Builder-style visibility setter.
    pub fn with_private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    /// Storage path of the blob for a file id.
    pub fn blob_path(id: &FileId) -> String {
        format!("{BLOB_DIR}/{id}")
    }

    /// Get the file extension (lowercase), if any.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit('.')
            .next()
            .filter(|ext| *ext != self.name)
            .map(|ext| ext.to_lowercase())
    }
}

impl Owned for File {
    fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    fn is_private(&self) -> bool {
        self.is_private
    }
}
