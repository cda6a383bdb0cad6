//! Core traits defined in `simplehost-core` and implemented by other crates.

pub mod storage;

pub use storage::{ByteStream, StorageObjectMeta, StorageProvider};
