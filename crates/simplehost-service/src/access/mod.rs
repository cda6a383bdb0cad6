//! Ownership and visibility checks.

pub mod guard;

pub use guard::AccessGuard;
