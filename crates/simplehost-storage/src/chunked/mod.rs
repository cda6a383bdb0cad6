//! Chunked upload handling.

pub mod assembler;
pub mod cleanup;
pub mod staging;

pub use assembler::ChunkAssembler;
pub use cleanup::OrphanChunkCleanup;
pub use staging::ChunkStaging;
