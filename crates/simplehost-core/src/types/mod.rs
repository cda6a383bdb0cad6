//! Core type definitions used across the SimpleHost workspace.

pub mod id;

pub use id::*;
