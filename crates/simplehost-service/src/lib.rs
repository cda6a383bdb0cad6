//! # simplehost-service
//!
//! Tree mutation and ingestion services for SimpleHost. Each service works
//! over an injected [`TreeStore`](simplehost_database::TreeStore) and
//! [`StorageProvider`](simplehost_core::traits::storage::StorageProvider),
//! and every call that acts for a caller takes a [`RequestContext`].

pub mod access;
pub mod context;
pub mod file;
pub mod folder;
pub mod naming;
pub mod upload;

pub use access::AccessGuard;
pub use context::RequestContext;
pub use file::{Download, FileService};
pub use folder::{CreateFolderRequest, DeleteMode, DeletionCoordinator, FolderService, PathResolver};
pub use upload::{BulkFile, ChunkAck, ChunkUpload, FinalizeUpload, UploadService};
