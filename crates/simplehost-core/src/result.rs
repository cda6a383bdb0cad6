//! Convenience result type alias for SimpleHost.

use crate::error::AppError;

/// A specialized `Result` type for SimpleHost operations.
pub type AppResult<T> = Result<T, AppError>;
