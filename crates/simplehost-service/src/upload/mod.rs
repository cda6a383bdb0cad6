//! Chunked and bulk uploads.

pub mod bulk;
pub mod register;
pub mod registry;
pub mod service;

pub use bulk::{BulkFile, IngestBatch};
pub use register::FileRegistrar;
pub use registry::{SessionHandle, SessionRegistry};
pub use service::{ChunkAck, ChunkUpload, FinalizeUpload, UploadService};
