//! Caller-specific listing views with the derived `can_delete` flag.

use serde::{Deserialize, Serialize};

use simplehost_core::types::UserId;

use crate::file::File;
use crate::folder::Folder;
use crate::ownership::Owned;

/// A folder as seen by one requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    /// The folder row.
    #[serde(flatten)]
    pub folder: Folder,
    /// Whether the requester owns (and may delete) the folder.
    pub can_delete: bool,
}

/// A file as seen by one requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// The file row.
    #[serde(flatten)]
    pub file: File,
    /// Whether the requester owns (and may delete) the file.
    pub can_delete: bool,
}

/// Direct children of one folder, already filtered for the requester.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderListing {
    /// Child folders.
    pub folders: Vec<FolderEntry>,
    /// Files in the folder.
    pub files: Vec<FileEntry>,
}

impl FolderEntry {
    /// Wrap a folder, computing `can_delete` for `requester`.
    pub fn for_requester(folder: Folder, requester: &UserId) -> Self {
        let can_delete = folder.is_owned_by(requester);
        Self { folder, can_delete }
    }
}

impl FileEntry {
    /// Wrap a file, computing `can_delete` for `requester`.
    pub fn for_requester(file: File, requester: &UserId) -> Self {
        let can_delete = file.is_owned_by(requester);
        Self { file, can_delete }
    }
}

impl FolderListing {
    /// Whether the listing has no children at all.
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.files.is_empty()
    }

    /// Look up a listed file by name.
    pub fn file_named(&self, name: &str) -> Option<&FileEntry> {
        self.files.iter().find(|entry| entry.file.name == name)
    }

    /// Look up a listed folder by name.
    pub fn folder_named(&self, name: &str) -> Option<&FolderEntry> {
        self.folders.iter().find(|entry| entry.folder.name == name)
    }
}
