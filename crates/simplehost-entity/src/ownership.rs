//! Ownership and visibility view shared by folders and files.

use simplehost_core::types::UserId;

/// An entity that has an owner and a private/shared flag.
pub trait Owned {
    /// The identity that created the entity.
    fn owner_id(&self) -> &UserId;

    /// Whether the entity is visible to its owner only.
    fn is_private(&self) -> bool;

    /// Whether `requester` owns this entity.
    fn is_owned_by(&self, requester: &UserId) -> bool {
        self.owner_id() == requester
    }

    /// Whether `requester` may see this entity in a listing.
    fn is_visible_to(&self, requester: &UserId) -> bool {
        !self.is_private() || self.is_owned_by(requester)
    }
}
