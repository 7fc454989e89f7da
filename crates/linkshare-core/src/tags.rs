//! Tag reconciliation
//!
//! Turns a tag diff (tags to add, tags to remove) into the association rows
//! to insert and the tag ids to detach. Tag identities are already resolved
//! by the caller; nothing here touches storage.

use std::collections::HashSet;

use crate::models::{ResourceTagAssociation, Tag};

/// Desired change to a resource's tags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagDiff {
    pub add: Vec<Tag>,
    pub remove: Vec<Tag>,
}

impl TagDiff {
    pub fn new(add: Vec<Tag>, remove: Vec<Tag>) -> Self {
        Self { add, remove }
    }

    /// A diff that only adds tags
    pub fn adding(add: Vec<Tag>) -> Self {
        Self {
            add,
            remove: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Association changes for one resource
///
/// Insertions are applied before deletions, so a tag that appears on both
/// sides of the diff ends up detached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagPlan {
    pub insertions: Vec<ResourceTagAssociation>,
    pub deletions: Vec<i64>,
    pub added_titles: Vec<String>,
    pub removed_titles: Vec<String>,
}

impl TagPlan {
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty() && self.deletions.is_empty()
    }
}

/// Compute the association changes for `resource_id`
///
/// Duplicate tags on either side collapse to one entry, keeping the order
/// of first appearance.
pub fn reconcile(resource_id: i64, diff: &TagDiff) -> TagPlan {
    let mut plan = TagPlan::default();

    let mut seen = HashSet::new();
    for tag in &diff.add {
        let pair = ResourceTagAssociation {
            resource_id,
            tag_id: tag.id,
        };
        if seen.insert(pair) {
            plan.insertions.push(pair);
            plan.added_titles.push(tag.title.clone());
        }
    }

    let mut seen = HashSet::new();
    for tag in &diff.remove {
        if seen.insert(tag.id) {
            plan.deletions.push(tag.id);
            plan.removed_titles.push(tag.title.clone());
        }
    }

    plan
}
