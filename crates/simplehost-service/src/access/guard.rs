//! Owner-only mutation and private-entity filtering.
//!
//! The rule set is small: the owner may do anything to an entity, everyone
//! may see a shared entity, and nobody but the owner may see a private one.
//! Every listing goes through [`AccessGuard::filter_visible`] and every
//! delete or visibility change through [`AccessGuard::authorize_mutation`].

use simplehost_core::error::AppError;
use simplehost_core::result::AppResult;
use simplehost_core::types::UserId;
use simplehost_entity::ownership::Owned;

/// Stateless ownership policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGuard;

impl AccessGuard {
    /// Whether `requester` may see `entity`.
    pub fn can_view<T: Owned>(entity: &T, requester: &UserId) -> bool {
        entity.is_visible_to(requester)
    }

    /// Whether `requester` may delete or modify `entity`.
    pub fn can_mutate<T: Owned>(entity: &T, requester: &UserId) -> bool {
        entity.is_owned_by(requester)
    }

    /// Drop entities that are private to someone other than `requester`.
    pub fn filter_visible<T: Owned>(entities: Vec<T>, requester: &UserId) -> Vec<T> {
        entities
            .into_iter()
            .filter(|e| Self::can_view(e, requester))
            .collect()
    }

    /// Fail with `Forbidden` unless `requester` may see `entity`.
    pub fn authorize_view<T: Owned>(entity: &T, requester: &UserId) -> AppResult<()> {
        if Self::can_view(entity, requester) {
            Ok(())
        } else {
            Err(AppError::forbidden("This item is private"))
        }
    }

    /// Fail with `Forbidden` unless `requester` owns `entity`.
    pub fn authorize_mutation<T: Owned>(entity: &T, requester: &UserId) -> AppResult<()> {
        if Self::can_mutate(entity, requester) {
            Ok(())
        } else {
            Err(AppError::forbidden("Only the owner may modify this item"))
        }
    }
}
