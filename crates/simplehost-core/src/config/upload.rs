//! Chunked upload session configuration.

use serde::{Deserialize, Serialize};

/// Chunked upload session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Idle time after which an unfinished session is reaped.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
    /// How often the server janitor sweeps stale sessions.
    #[serde(default = "default_janitor_interval")]
    pub janitor_interval_seconds: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: default_session_ttl(),
            janitor_interval_seconds: default_janitor_interval(),
        }
    }
}

fn default_session_ttl() -> u64 {
    86_400 // 24 hours
}

fn default_janitor_interval() -> u64 {
    900
}
