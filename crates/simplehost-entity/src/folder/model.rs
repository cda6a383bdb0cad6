//! Folder entity model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use simplehost_core::types::{FolderId, UserId};

use crate::ownership::Owned;

/// Display name of the root folder.
pub const ROOT_FOLDER_NAME: &str = "Root";

/// A folder in the virtual tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Folder {
    /// Unique folder identifier.
    pub id: FolderId,
    /// Folder name. Not unique across the tree.
    pub name: String,
    /// Parent folder ID (`None` only for the root).
    pub parent_id: Option<FolderId>,
    /// The folder owner.
    pub owner_id: UserId,
    /// Whether only the owner may see this folder.
    pub is_private: bool,
}

impl Folder {
    /// The distinguished root folder, owned by the system identity.
    pub fn root() -> Self {
        Self {
            id: FolderId::root(),
            name: ROOT_FOLDER_NAME.to_string(),
            parent_id: None,
            owner_id: UserId::system(),
            is_private: false,
        }
    }

    /// A new shared folder with a fresh id under `parent_id`.
    pub fn new_child(name: impl Into<String>, parent_id: FolderId, owner_id: UserId) -> Self {
        Self {
            id: FolderId::new(),
            name: name.into(),
            parent_id: Some(parent_id),
            owner_id,
            is_private: false,
        }
    }

    /// Builder-style visibility setter.
    pub fn with_private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    /// Check if this is the root folder.
    pub fn is_root(&self) -> bool {
        self.id.is_root()
    }
}

impl Owned for Folder {
    fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    fn is_private(&self) -> bool {
        self.is_private
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_shape() {
        let root = Folder::root();
        assert!(root.is_root());
        assert!(root.parent_id.is_none());
        assert_eq!(root.owner_id, UserId::system());
        assert!(!root.is_private);
    }

    #[test]
    fn test_new_child_gets_fresh_id() {
        let a = Folder::new_child("Docs", FolderId::root(), UserId::from("u1"));
        let b = Folder::new_child("Docs", FolderId::root(), UserId::from("u1"));
        assert_ne!(a.id, b.id);
        assert_eq!(a.parent_id, Some(FolderId::root()));
        assert!(!a.is_root());
    }

    #[test]
    fn test_private_visibility() {
        let folder =
            Folder::new_child("Secret", FolderId::root(), UserId::from("u1")).with_private(true);
        assert!(folder.is_visible_to(&UserId::from("u1")));
        assert!(!folder.is_visible_to(&UserId::from("u2")));
    }
}
