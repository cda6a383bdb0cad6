//! Single-file services.

pub mod service;

pub use service::{Download, FileService};
