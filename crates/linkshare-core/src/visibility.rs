//! Read access rules for resources
//!
//! First match wins:
//!
//! 1. the requester owns the resource
//! 2. the resource is public
//! 3. the resource is followers-only and the requester follows the owner
//!
//! Anything else is denied, and a denial looks exactly like a missing
//! resource. The same rule exists twice: [`can_view`] for in-process checks
//! and [`ACCESS_PREDICATE`] for queries, so that a fetch never loads a row
//! the caller may not see.

use crate::models::Privacy;

/// How the requester relates to a resource's owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    /// The requester is the owner
    Owner,
    /// The requester follows the owner
    Follower,
    /// Neither
    Stranger,
}

impl Relationship {
    /// Work out the relationship from ids and the follow flag
    pub fn resolve(owner_id: i64, requester_id: i64, follows_owner: bool) -> Self {
        if owner_id == requester_id {
            Relationship::Owner
        } else if follows_owner {
            Relationship::Follower
        } else {
            Relationship::Stranger
        }
    }
}

/// Decide whether a relationship grants read access at a privacy level
pub fn allows(privacy: Privacy, relationship: Relationship) -> bool {
    match (relationship, privacy) {
        (Relationship::Owner, _) => true,
        (_, Privacy::Public) => true,
        (Relationship::Follower, Privacy::Followers) => true,
        _ => false,
    }
}

/// Decide whether `requester_id` may read a resource
pub fn can_view(owner_id: i64, privacy: Privacy, requester_id: i64, follows_owner: bool) -> bool {
    allows(
        privacy,
        Relationship::resolve(owner_id, requester_id, follows_owner),
    )
}

/// SQL form of [`can_view`]
///
/// Expects the resource table aliased as `r` and the requester id bound to
/// the named parameter `:requester`.
pub const ACCESS_PREDICATE: &str = "(r.user_id = :requester \
     OR r.privacy = 'public' \
     OR (r.privacy = 'followers' AND EXISTS (\
         SELECT 1 FROM connections c \
         WHERE c.initiator_id = :requester AND c.recipient_id = r.user_id)))";
