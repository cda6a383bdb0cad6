//! Chunked upload session state machine.
//!
//! A session is keyed by a caller-supplied upload id and moves through
//! `Collecting -> Assembling -> Registered -> Cleaned`. `Failed` can be
//! entered from `Collecting` or `Assembling` and is then cleaned like a
//! registered session. The transition out of `Collecting` happens at most
//! once per session.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use simplehost_core::error::AppError;
use simplehost_core::result::AppResult;
use simplehost_core::types::{FileId, FolderId, UploadId, UserId};

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UploadState {
    /// Chunks are being staged.
    Collecting {
        /// Indices staged so far.
        received: BTreeSet<u32>,
    },
    /// One finalizer is concatenating the staged chunks.
    Assembling,
    /// The assembled blob has been registered as a file.
    Registered {
        /// The registered file.
        file_id: FileId,
    },
    /// The staging area has been removed.
    Cleaned,
    /// Assembly or registration failed.
    Failed {
        /// Human-readable cause.
        reason: String,
    },
}

impl UploadState {
    /// Return the status as a short string for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collecting { .. } => "collecting",
            Self::Assembling => "assembling",
            Self::Registered { .. } => "registered",
            Self::Cleaned => "cleaned",
            Self::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One chunked upload session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    /// Session key supplied by the client.
    pub upload_id: UploadId,
    /// The uploader; only they may stage or finalize.
    pub owner_id: UserId,
    /// Folder the assembled file will be registered in.
    pub folder_id: FolderId,
    /// Name the assembled file will be registered under.
    pub file_name: String,
    /// Number of chunks the client announced.
    pub total_chunks: u32,
    /// Whether an existing same-named file may be replaced.
    pub overwrite: bool,
    /// Whether the registered file is private.
    pub is_private: bool,
    /// Current lifecycle state.
    pub state: UploadState,
    /// When the first chunk or finalize request arrived.
    pub created_at: DateTime<Utc>,
    /// When the session last changed.
    pub last_activity: DateTime<Utc>,
}

impl UploadSession {
    /// Open a collecting session.
    pub fn new(
        upload_id: UploadId,
        owner_id: UserId,
        folder_id: FolderId,
        file_name: impl Into<String>,
        total_chunks: u32,
        overwrite: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            upload_id,
            owner_id,
            folder_id,
            file_name: file_name.into(),
            total_chunks,
            overwrite,
            is_private: false,
            state: UploadState::Collecting {
                received: BTreeSet::new(),
            },
            created_at: now,
            last_activity: now,
        }
    }

    /// Check that a follow-up request describes the same upload.
    pub fn ensure_matches(
        &self,
        owner_id: &UserId,
        folder_id: &FolderId,
        file_name: &str,
        total_chunks: u32,
    ) -> AppResult<()> {
        if &self.owner_id != owner_id {
            return Err(AppError::forbidden(format!(
                "Upload session {} belongs to another user",
                self.upload_id
            )));
        }
        if &self.folder_id != folder_id || self.file_name != file_name {
            return Err(AppError::validation(format!(
                "Upload session {} targets '{}' in folder {}",
                self.upload_id, self.file_name, self.folder_id
            )));
        }
        if self.total_chunks != total_chunks {
            return Err(AppError::validation(format!(
                "Upload session {} expects {} chunks, request says {}",
                self.upload_id, self.total_chunks, total_chunks
            )));
        }
        Ok(())
    }

    /// Whether the session still accepts chunks.
    pub fn is_collecting(&self) -> bool {
        matches!(self.state, UploadState::Collecting { .. })
    }

    /// Whether nothing further can happen to the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, UploadState::Cleaned)
    }

    /// Fail with `Conflict` unless the session is collecting.
    pub fn ensure_collecting(&self) -> AppResult<()> {
        if self.is_collecting() {
            Ok(())
        } else {
            Err(AppError::conflict(format!(
                "Upload session {} is already {}",
                self.upload_id, self.state
            )))
        }
    }

    /// Record a staged chunk index.
    pub fn record_chunk(&mut self, index: u32) -> AppResult<()> {
        if index >= self.total_chunks {
            return Err(AppError::validation(format!(
                "Invalid chunk index {index} (total: {})",
                self.total_chunks
            )));
        }
        self.ensure_collecting()?;
        if let UploadState::Collecting { received } = &mut self.state {
            received.insert(index);
        }
        self.touch();
        Ok(())
    }

    /// Number of distinct indices staged through this session.
    pub fn received_count(&self) -> usize {
        match &self.state {
            UploadState::Collecting { received } => received.len(),
            _ => self.total_chunks as usize,
        }
    }

    /// Upload progress as a percentage (0-100).
    pub fn progress_percent(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        (self.received_count() as f64 / self.total_chunks as f64) * 100.0
    }

    /// Atomically leave `Collecting` for `Assembling`.
    ///
    /// Callers hold the session lock, so a second finalizer observes
    /// `Assembling` (or later) and gets `Conflict`.
    pub fn begin_assembly(&mut self) -> AppResult<()> {
        self.ensure_collecting()?;
        self.state = UploadState::Assembling;
        self.touch();
        Ok(())
    }

    /// Record the registered file after a successful assembly.
    pub fn mark_registered(&mut self, file_id: FileId) -> AppResult<()> {
        if self.state != UploadState::Assembling {
            return Err(AppError::internal(format!(
                "Upload session {} cannot register from state {}",
                self.upload_id, self.state
            )));
        }
        self.state = UploadState::Registered { file_id };
        self.touch();
        Ok(())
    }

    /// Enter the terminal failure state.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        if matches!(
            self.state,
            UploadState::Collecting { .. } | UploadState::Assembling
        ) {
            self.state = UploadState::Failed {
                reason: reason.into(),
            };
            self.touch();
        }
    }

    /// Record that the staging area is gone.
    pub fn mark_cleaned(&mut self) {
        if matches!(
            self.state,
            UploadState::Registered { .. } | UploadState::Failed { .. }
        ) {
            self.state = UploadState::Cleaned;
            self.touch();
        }
    }

    /// The registered file, if registration happened.
    pub fn registered_file(&self) -> Option<&FileId> {
        match &self.state {
            UploadState::Registered { file_id } => Some(file_id),
            _ => None,
        }
    }

    /// Whether the session has been idle longer than `ttl`.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_activity > ttl
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}
