//! File domain entities.

pub mod chunk;
pub mod model;

pub use crate::folder::listing::FileEntry;
pub use chunk::{UploadSession, UploadState};
pub use model::File;
