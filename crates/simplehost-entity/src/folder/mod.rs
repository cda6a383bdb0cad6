//! Folder domain entities.

pub mod listing;
pub mod model;

pub use listing::{FileEntry, FolderEntry, FolderListing};
pub use model::Folder;
