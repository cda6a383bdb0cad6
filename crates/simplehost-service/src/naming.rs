//! Name rules for folders and files.

use simplehost_core::error::AppError;
use simplehost_core::result::AppResult;

/// Longest accepted folder or file name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Trim `name` and check it can be stored as a single tree entry.
///
/// Names must be non-empty, must not be `.` or `..`, and must not contain a
/// path separator.
pub fn validate_name(name: &str) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("Name cannot be empty"));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(AppError::validation(format!("'{trimmed}' is not a valid name")));
    }
    if trimmed.contains(['/', '\\']) {
        return Err(AppError::validation(format!(
            "Name '{trimmed}' must not contain a path separator"
        )));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "Name exceeds {MAX_NAME_LEN} bytes"
        )));
    }
    Ok(trimmed.to_string())
}
