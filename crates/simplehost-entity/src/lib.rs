//! # simplehost-entity
//!
//! Domain entity models for SimpleHost. Every struct in this crate
//! represents a database table row or a domain value object. Database
//! entities additionally derive `sqlx::FromRow`.

pub mod file;
pub mod folder;
pub mod ownership;

pub use file::{File, FileEntry, UploadSession, UploadState};
pub use folder::{Folder, FolderEntry, FolderListing};
pub use ownership::Owned;
