//! Request context carrying the requester identity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use simplehost_core::error::AppError;
use simplehost_core::types::UserId;

/// Claim key holding the requester id in decoded session claims.
pub const USER_ID_CLAIM: &str = "userId";

/// Context for the current authenticated request.
///
/// Built by whatever authenticates the caller and passed into every service
/// method, so each operation knows who is acting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The authenticated requester.
    pub requester_id: UserId,
    /// Remaining claims from the session token, if any.
    #[serde(default)]
    pub claims: HashMap<String, String>,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context for `requester_id`.
    pub fn new(requester_id: impl Into<UserId>) -> Self {
        Self {
            requester_id: requester_id.into(),
            claims: HashMap::new(),
            request_time: Utc::now(),
        }
    }

    /// Builds a context from decoded claims; the `userId` claim is required.
    pub fn from_claims(claims: HashMap<String, String>) -> Result<Self, AppError> {
        let requester_id = claims
            .get(USER_ID_CLAIM)
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(UserId::from)
            .ok_or_else(|| AppError::forbidden("No authenticated user in request"))?;
        Ok(Self {
            requester_id,
            claims,
            request_time: Utc::now(),
        })
    }

    /// Look up a claim by name.
    pub fn claim(&self, key: &str) -> Option<&str> {
        self.claims.get(key).map(String::as_str)
    }
}
