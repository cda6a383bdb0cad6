//! # simplehost-database
//!
//! SQLite connection management, the folder and file repositories, and the
//! [`TreeStore`] contract the services mutate the tree through.

pub mod connection;
pub mod migration;
pub mod repositories;
pub mod tree;

pub use connection::DatabasePool;
pub use tree::{SqlTreeStore, TreeStore};
