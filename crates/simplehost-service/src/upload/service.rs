//! Chunked and bulk upload flows.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use simplehost_core::config::{StorageConfig, UploadConfig};
use simplehost_core::error::{AppError, ErrorKind};
use simplehost_core::result::AppResult;
use simplehost_core::traits::storage::StorageProvider;
use simplehost_core::types::{FileId, FolderId, UploadId};
use simplehost_database::TreeStore;
use simplehost_entity::file::{File, UploadSession, UploadState};
use simplehost_storage::{ChunkAssembler, ChunkStaging, OrphanChunkCleanup};

use crate::access::AccessGuard;
use crate::context::RequestContext;
use crate::naming::validate_name;
use crate::upload::bulk::{BulkFile, IngestBatch, split_relative_path};
use crate::upload::register::FileRegistrar;
use crate::upload::registry::{SessionHandle, SessionRegistry};

/// One chunk of a chunked upload.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    /// Client-chosen session key shared by every chunk of the upload.
    pub upload_id: UploadId,
    /// Target folder (the root when omitted).
    pub folder_id: Option<FolderId>,
    /// Name the assembled file is registered under.
    pub file_name: String,
    /// Zero-based chunk index.
    pub chunk_index: u32,
    /// Number of chunks in the upload.
    pub total_chunks: u32,
    /// Replace an existing same-named file. The index-0 chunk decides.
    pub overwrite: bool,
    /// Register the file as private. Taken from the chunk that opens the session.
    pub is_private: bool,
    /// Chunk bytes.
    pub data: Bytes,
}

/// Request to finalize a chunked upload explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeUpload {
    /// Session key.
    pub upload_id: UploadId,
    /// Target folder (the root when omitted).
    #[serde(default)]
    pub folder_id: Option<FolderId>,
    /// File name.
    pub file_name: String,
    /// Number of chunks in the upload.
    pub total_chunks: u32,
    /// Replace an existing same-named file.
    #[serde(default)]
    pub overwrite: bool,
}

/// Outcome of staging a chunk.
#[derive(Debug, Clone)]
pub enum ChunkAck {
    /// The chunk is staged; the upload is not complete yet.
    Staged {
        /// Session key.
        upload_id: UploadId,
        /// The staged index.
        chunk_index: u32,
        /// Distinct indices staged so far.
        received: usize,
        /// Number of chunks in the upload.
        total_chunks: u32,
    },
    /// This chunk completed the upload and the file is registered.
    Completed(File),
}

impl ChunkAck {
    /// The registered file, when the upload completed.
    pub fn file(&self) -> Option<&File> {
        match self {
            Self::Completed(file) => Some(file),
            Self::Staged { .. } => None,
        }
    }
}

/// Drives upload sessions from the first chunk to a registered file.
#[derive(Debug, Clone)]
pub struct UploadService {
    /// Tree store.
    tree: Arc<dyn TreeStore>,
    /// Blob storage.
    storage: Arc<dyn StorageProvider>,
    /// Per-session chunk staging.
    staging: ChunkStaging,
    /// Chunk concatenation.
    assembler: ChunkAssembler,
    /// Staging directory sweeper.
    orphans: OrphanChunkCleanup,
    /// Live sessions.
    sessions: Arc<SessionRegistry>,
    /// Name-collision policy.
    registrar: FileRegistrar,
    /// Size limits.
    limits: StorageConfig,
    /// Session lifetime settings.
    config: UploadConfig,
}

impl UploadService {
    /// Creates a new upload service.
    pub fn new(
        tree: Arc<dyn TreeStore>,
        storage: Arc<dyn StorageProvider>,
        limits: StorageConfig,
        config: UploadConfig,
    ) -> Self {
        Self {
            staging: ChunkStaging::new(Arc::clone(&storage)),
            assembler: ChunkAssembler::new(Arc::clone(&storage)),
            orphans: OrphanChunkCleanup::new(Arc::clone(&storage)),
            registrar: FileRegistrar::new(Arc::clone(&tree), Arc::clone(&storage)),
            sessions: Arc::new(SessionRegistry::new()),
            tree,
            storage,
            limits,
            config,
        }
    }

    /// Number of sessions currently tracked, including finished ones not
    /// yet reaped.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Idle time after which a session is reaped.
    pub fn session_ttl(&self) -> Duration {
        let secs = i64::try_from(self.config.session_ttl_seconds).unwrap_or(i64::MAX);
        Duration::try_seconds(secs).unwrap_or(Duration::MAX)
    }

    /// Stage one chunk.
    ///
    /// The chunk with index 0 checks the target name before anything is
    /// written. Staging the last index, or any index that completes the
    /// set, finalizes the upload when every chunk is present.
    pub async fn stage_chunk(&self, ctx: &RequestContext, req: ChunkUpload) -> AppResult<ChunkAck> {
        if req.total_chunks == 0 {
            return Err(AppError::validation("total_chunks must be at least 1"));
        }
        if req.chunk_index >= req.total_chunks {
            return Err(AppError::validation(format!(
                "Invalid chunk index {} (total: {})",
                req.chunk_index, req.total_chunks
            )));
        }
        if req.data.len() as u64 > self.limits.max_chunk_size_bytes {
            return Err(AppError::validation(format!(
                "Chunk exceeds maximum size of {} bytes",
                self.limits.max_chunk_size_bytes
            )));
        }
        ChunkStaging::validate_upload_id(&req.upload_id)?;
        let name = validate_name(&req.file_name)?;
        let folder_id = FolderId::or_root(req.folder_id);
        let owner = &ctx.requester_id;

        if self.sessions.get(&req.upload_id).is_none() {
            self.authorize_target(ctx, &folder_id).await?;
        }
        if req.chunk_index == 0 {
            self.registrar
                .check_slot(&folder_id, &name, owner, req.overwrite)
                .await?;
        }

        let (handle, created) = self.sessions.get_or_open(&req.upload_id, || {
            let mut session = UploadSession::new(
                req.upload_id.clone(),
                owner.clone(),
                folder_id.clone(),
                name.clone(),
                req.total_chunks,
                req.overwrite,
            );
            session.is_private = req.is_private;
            session
        });
        if created {
            info!(
                user_id = %owner,
                upload_id = %req.upload_id,
                folder_id = %folder_id,
                name = %name,
                total_chunks = req.total_chunks,
                "Upload session opened"
            );
        }

        let claimed = {
            let mut session = handle.lock().await;
            session.ensure_matches(owner, &folder_id, &name, req.total_chunks)?;
            session.ensure_collecting()?;
            if req.chunk_index == 0 {
                session.overwrite = req.overwrite;
            }

            let size = self
                .staging
                .write_chunk(&req.upload_id, req.chunk_index, req.data)
                .await?;
            session.record_chunk(req.chunk_index)?;
            debug!(
                upload_id = %req.upload_id,
                chunk_index = req.chunk_index,
                size,
                received = session.received_count(),
                "Chunk staged"
            );

            let last = req.chunk_index + 1 == req.total_chunks;
            let complete = session.received_count() == req.total_chunks as usize;
            if last || complete {
                self.claim_for_assembly(&mut session, false).await?
            } else {
                None
            }
        };

        match claimed {
            Some(snapshot) => {
                let file = self.complete(&handle, snapshot).await?;
                Ok(ChunkAck::Completed(file))
            }
            None => {
                let received = handle.lock().await.received_count();
                Ok(ChunkAck::Staged {
                    upload_id: req.upload_id,
                    chunk_index: req.chunk_index,
                    received,
                    total_chunks: req.total_chunks,
                })
            }
        }
    }

    /// Finalize an upload whose chunks are all staged.
    ///
    /// Fails with `MissingChunk` naming the first absent index, leaving the
    /// session open for restaging, and with `Conflict` when the session has
    /// already been finalized.
    pub async fn finalize_upload(&self, ctx: &RequestContext, req: FinalizeUpload) -> AppResult<File> {
        ChunkStaging::validate_upload_id(&req.upload_id)?;
        let name = validate_name(&req.file_name)?;
        let folder_id = FolderId::or_root(req.folder_id);

        let handle = self
            .sessions
            .get(&req.upload_id)
            .ok_or_else(|| AppError::not_found(format!("Upload session {} not found", req.upload_id)))?;

        let snapshot = {
            let mut session = handle.lock().await;
            session.ensure_matches(&ctx.requester_id, &folder_id, &name, req.total_chunks)?;
            session.overwrite = req.overwrite;
            self.claim_for_assembly(&mut session, true).await?
        };

        match snapshot {
            Some(snapshot) => self.complete(&handle, snapshot).await,
            None => Err(AppError::internal(format!(
                "Upload session {} could not be claimed",
                req.upload_id
            ))),
        }
    }

    /// Remove an upload's staging area. Safe to call repeatedly.
    ///
    /// An open session is cancelled; a session being assembled is left
    /// alone and the call fails with `Conflict`.
    pub async fn cleanup(&self, upload_id: &UploadId) -> AppResult<()> {
        ChunkStaging::validate_upload_id(upload_id)?;
        let Some(handle) = self.sessions.get(upload_id) else {
            return self.staging.remove_upload(upload_id).await;
        };

        let mut session = handle.lock().await;
        if session.state == UploadState::Assembling {
            return Err(AppError::conflict(format!(
                "Upload session {upload_id} is being assembled"
            )));
        }
        self.staging.remove_upload(upload_id).await?;
        if session.is_collecting() {
            session.mark_failed("cancelled");
            info!(upload_id = %upload_id, "Upload session cancelled");
        }
        session.mark_cleaned();
        Ok(())
    }

    /// Upload many files at once, creating the folders named by their
    /// relative paths below `folder_id`.
    ///
    /// Fails as a whole only when the base folder cannot be used; otherwise
    /// returns one result per input file in input order.
    pub async fn bulk_upload(
        &self,
        ctx: &RequestContext,
        folder_id: Option<FolderId>,
        files: Vec<BulkFile>,
        overwrite: bool,
    ) -> AppResult<Vec<AppResult<File>>> {
        let base = FolderId::or_root(folder_id);
        self.authorize_target(ctx, &base).await?;

        let mut batch = IngestBatch::new(base.clone(), ctx.requester_id.clone());
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            let path = file.relative_path.clone();
            let result = self.ingest_one(ctx, &mut batch, file, overwrite).await;
            if let Err(e) = &result {
                warn!(user_id = %ctx.requester_id, path = %path, error = %e, "Bulk upload entry failed");
            }
            results.push(result);
        }

        info!(
            user_id = %ctx.requester_id,
            folder_id = %base,
            files = results.len(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            folders_created = batch.created_count(),
            "Bulk upload finished"
        );
        Ok(results)
    }

    /// Drop sessions idle longer than `max_age` together with their staging
    /// areas, then sweep staging directories that have no session at all.
    /// Returns the number of staging areas removed.
    pub async fn reap_stale_sessions(&self, max_age: Duration) -> AppResult<usize> {
        let now = Utc::now();
        let mut reaped = 0;

        for upload_id in self.sessions.stale(now, max_age) {
            let Some(handle) = self.sessions.get(&upload_id) else {
                continue;
            };
            let mut session = handle.lock().await;
            if !session.is_stale(now, max_age) {
                continue;
            }
            if session.state == UploadState::Assembling {
                warn!(upload_id = %upload_id, "Reaping upload session stuck in assembly");
            }
            self.sessions.remove(&upload_id);
            if let Err(e) = self.staging.remove_upload(&upload_id).await {
                warn!(upload_id = %upload_id, error = %e, "Failed to remove staging area");
                continue;
            }
            session.mark_failed("expired");
            session.mark_cleaned();
            debug!(upload_id = %upload_id, "Reaped upload session");
            reaped += 1;
        }

        let cutoff = now.checked_sub_signed(max_age).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let swept = self.orphans.sweep(cutoff, &self.sessions.ids()).await?;
        if reaped + swept > 0 {
            info!(sessions = reaped, orphans = swept, "Reaped stale uploads");
        }
        Ok(reaped + swept)
    }

    /// Move a locked session to `Assembling` if every chunk is staged.
    ///
    /// A gap is an error when `explicit` and a quiet `None` otherwise, so a
    /// last chunk that arrives early just stays staged.
    async fn claim_for_assembly(
        &self,
        session: &mut UploadSession,
        explicit: bool,
    ) -> AppResult<Option<UploadSession>> {
        session.ensure_collecting()?;
        if let Some(index) = self
            .staging
            .first_missing(&session.upload_id, session.total_chunks)
            .await?
        {
            if explicit {
                return Err(AppError::missing_chunk(index));
            }
            debug!(upload_id = %session.upload_id, missing = index, "Upload not complete yet");
            return Ok(None);
        }
        session.begin_assembly()?;
        Ok(Some(session.clone()))
    }

    /// Assemble and register a claimed session on its own task.
    ///
    /// The task runs to completion even if the caller stops waiting, so a
    /// session never stays `Assembling` because a request went away.
    async fn complete(&self, handle: &SessionHandle, snapshot: UploadSession) -> AppResult<File> {
        let upload_id = snapshot.upload_id.clone();
        let this = self.clone();
        let handle = Arc::clone(handle);
        tokio::spawn(async move { this.finish_assembly(&handle, snapshot).await })
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Internal,
                    format!("Assembly task for upload {upload_id} did not finish"),
                    e,
                )
            })?
    }

    /// Assemble, register, record the outcome, then release the staging
    /// area. The session lock is not held while assembling.
    async fn finish_assembly(&self, handle: &SessionHandle, snapshot: UploadSession) -> AppResult<File> {
        let upload_id = snapshot.upload_id.clone();
        let result = self.assemble_and_register(snapshot).await;

        let mut session = handle.lock().await;
        match &result {
            Ok(file) => match session.mark_registered(file.id.clone()) {
                Ok(()) => {
                    info!(upload_id = %upload_id, file_id = %file.id, "Chunked upload completed")
                }
                Err(e) => {
                    warn!(upload_id = %upload_id, file_id = %file.id, error = %e, "Upload session was reaped during assembly")
                }
            },
            Err(e) => {
                session.mark_failed(e.to_string());
                warn!(upload_id = %upload_id, error = %e, "Chunked upload failed");
            }
        }

        match self.staging.remove_upload(&upload_id).await {
            Ok(()) => session.mark_cleaned(),
            Err(e) => warn!(upload_id = %upload_id, error = %e, "Failed to remove staging area"),
        }
        result
    }

    async fn assemble_and_register(&self, session: UploadSession) -> AppResult<File> {
        let file_id = FileId::new();
        let target = File::blob_path(&file_id);
        let size = self
            .assembler
            .assemble(&session.upload_id, session.total_chunks, &target)
            .await?;

        let file = File::new(
            file_id,
            session.file_name,
            session.folder_id,
            session.owner_id,
            size,
        )
        .with_private(session.is_private);
        self.registrar.register(file, session.overwrite).await
    }

    async fn ingest_one(
        &self,
        ctx: &RequestContext,
        batch: &mut IngestBatch,
        file: BulkFile,
        overwrite: bool,
    ) -> AppResult<File> {
        let size = file.data.len() as u64;
        if size > self.limits.max_upload_size_bytes {
            return Err(AppError::validation(format!(
                "File exceeds maximum upload size of {} bytes",
                self.limits.max_upload_size_bytes
            )));
        }

        let (dirs, name) = split_relative_path(&file.relative_path)?;
        let folder_id = batch.materialize_folder_chain(self.tree.as_ref(), &dirs).await?;
        self.registrar
            .check_slot(&folder_id, &name, &ctx.requester_id, overwrite)
            .await?;

        let record = File::new(FileId::new(), name, folder_id, ctx.requester_id.clone(), size);
        self.storage.write(&record.storage_path, file.data).await?;
        self.registrar.register(record, overwrite).await
    }

    async fn authorize_target(&self, ctx: &RequestContext, folder_id: &FolderId) -> AppResult<()> {
        let folder = self
            .tree
            .get_folder(folder_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Folder {folder_id} not found")))?;
        AccessGuard::authorize_view(&folder, &ctx.requester_id)
    }
}
