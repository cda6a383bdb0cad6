//! Folder tree policy configuration.

use serde::{Deserialize, Serialize};

/// How a cascade delete treats descendants owned by someone other than the
/// requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeOwnership {
    /// Only the target folder is ownership-checked; every descendant is
    /// deleted regardless of owner.
    #[default]
    Permissive,
    /// The cascade is refused if any descendant belongs to another owner.
    Strict,
}

/// Folder tree policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Descendant ownership policy for cascade deletes.
    #[serde(default)]
    pub cascade_ownership: CascadeOwnership,
    /// Upper bound on ancestor walks; a longer chain is reported as corrupt.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            cascade_ownership: CascadeOwnership::default(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> usize {
    4096
}
