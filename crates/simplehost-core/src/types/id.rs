//! Newtype wrappers around `String` for all domain entity identifiers.
//!
//! Using distinct types prevents accidentally passing a `FileId` where a
//! `FolderId` is expected; folder and file ids live in separate namespaces.
//! Ids are opaque strings because the root folder uses the fixed sentinel
//! `"root"` and upload sessions are keyed by client-chosen tokens. When the
//! `sqlx` feature is enabled each id type is a transparent `sqlx::Type`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Macro to define a newtype ID wrapper around `String`.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner string value.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(AppError::validation(concat!(
                        stringify!($name),
                        " must not be empty"
                    )));
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a folder.
    FolderId
);

define_id!(
    /// Unique identifier for a file.
    FileId
);

define_id!(
    /// Identity of an owner or requester.
    UserId
);

define_id!(
    /// Caller-supplied key of a chunked upload session.
    UploadId
);

/// Sentinel id of the root folder.
pub const ROOT_FOLDER_ID: &str = "root";

/// Owner recorded on the root folder.
pub const SYSTEM_USER_ID: &str = "system";

impl FolderId {
    /// The fixed id of the single root folder.
    pub fn root() -> Self {
        Self(ROOT_FOLDER_ID.to_string())
    }

    /// Whether this id is the root sentinel.
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_FOLDER_ID
    }

    /// Use the given id, or the root when the caller supplied none.
    pub fn or_root(id: Option<Self>) -> Self {
        id.unwrap_or_else(Self::root)
    }
}

impl UserId {
    /// The system identity that owns the root folder.
    pub fn system() -> Self {
        Self(SYSTEM_USER_ID.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_id_new_is_unique() {
        let id1 = FolderId::new();
        let id2 = FolderId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_root_sentinel() {
        assert!(FolderId::root().is_root());
        assert!(!FolderId::new().is_root());
        assert_eq!(FolderId::or_root(None), FolderId::root());
        assert_eq!(
            FolderId::or_root(Some(FolderId::from("docs"))),
            FolderId::from("docs")
        );
    }

    #[test]
    fn test_from_str_rejects_empty() {
        assert!("   ".parse::<FileId>().is_err());
        let id: UploadId = " abc ".parse().expect("should parse");
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = UserId::from("u1");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"u1\"");
        let parsed: UserId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, id);
    }
}
