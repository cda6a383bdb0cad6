//! Folder services: listing, breadcrumbs, creation, and deletion.

pub mod deletion;
pub mod path;
pub mod service;

pub use deletion::{DeleteMode, DeletionCoordinator};
pub use path::PathResolver;
pub use service::{CreateFolderRequest, FolderService};
