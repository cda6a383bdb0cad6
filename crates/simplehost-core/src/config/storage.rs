//! Blob storage configuration.

use serde::{Deserialize, Serialize};

/// Blob storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the local blob store. Staged chunks live under
    /// `_chunks/` and assembled blobs under `blobs/`.
    #[serde(default = "default_root_path")]
    pub root_path: String,
    /// Maximum size of a single uploaded file in bytes (default 5 GB).
    #[serde(default = "default_max_upload")]
    pub max_upload_size_bytes: u64,
    /// Maximum size of a single staged chunk in bytes (default 64 MB).
    #[serde(default = "default_max_chunk")]
    pub max_chunk_size_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            max_upload_size_bytes: default_max_upload(),
            max_chunk_size_bytes: default_max_chunk(),
        }
    }
}

fn default_root_path() -> String {
    "./simplehostdata".to_string()
}

fn default_max_upload() -> u64 {
    5_368_709_120 // 5 GB
}

fn default_max_chunk() -> u64 {
    67_108_864 // 64 MB
}
