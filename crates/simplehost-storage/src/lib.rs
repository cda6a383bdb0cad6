//! # simplehost-storage
//!
//! Blob storage for SimpleHost: the local filesystem provider, plus chunk
//! staging, streaming assembly, and orphan cleanup for chunked uploads.

pub mod chunked;
pub mod providers;

pub use chunked::{ChunkAssembler, ChunkStaging, OrphanChunkCleanup};
pub use providers::LocalStorageProvider;
