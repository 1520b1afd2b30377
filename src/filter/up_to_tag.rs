use crate::changelog::{ChangeSet, ChangeSetId, RanChangeSet};
use crate::filter::{FilterKind, FilterResult};

/// Locates the changeset that ends an update-to-tag run
///
/// A changeset is the boundary when its id equals the tag, when it declares
/// the tag, or when an earlier run recorded the tag on it in the ledger
/// (matched case-insensitively).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagBoundary {
    tag: String,
    ran_change_set_tag_is_on: Option<ChangeSetId>,
}

impl TagBoundary {
    pub fn new(tag: impl Into<String>, ran_change_sets: &[RanChangeSet]) -> Self {
        let tag = tag.into();
        let ran_change_set_tag_is_on = ran_change_sets
            .iter()
            .find(|ran| {
                ran.tag
                    .as_deref()
                    .is_some_and(|ran_tag| ran_tag.eq_ignore_ascii_case(&tag))
            })
            .map(|ran| ran.identity.clone());

        Self {
            tag,
            ran_change_set_tag_is_on,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_boundary(&self, change_set: &ChangeSet) -> bool {
        self.ran_change_set_tag_is_on.as_ref() == Some(change_set.identity())
            || change_set.id() == self.tag
            || change_set.tag() == Some(self.tag.as_str())
    }
}

/// Accepts every changeset up to and including the [`TagBoundary`]
///
/// If the boundary is never observed, nothing is rejected.
#[derive(Debug, Clone)]
pub struct UpToTagChangeSetFilter {
    boundary: TagBoundary,
    seen_tag: bool,
}

impl UpToTagChangeSetFilter {
    pub fn new(tag: impl Into<String>, ran_change_sets: &[RanChangeSet]) -> Self {
        Self {
            boundary: TagBoundary::new(tag, ran_change_sets),
            seen_tag: false,
        }
    }

    pub fn accepts(&mut self, change_set: &ChangeSet) -> FilterResult {
        if self.seen_tag {
            return FilterResult::reject(
                FilterKind::UpToTag,
                format!("Changeset is after tag '{}'", self.tag()),
            );
        }

        if self.boundary.is_boundary(change_set) {
            self.seen_tag = true;
        }

        FilterResult::accept(
            FilterKind::UpToTag,
            format!("Changeset is at or before tag '{}'", self.tag()),
        )
    }

    pub fn boundary(&self) -> &TagBoundary {
        &self.boundary
    }

    pub fn tag(&self) -> &str {
        self.boundary.tag()
    }

    /// Whether the tag's changeset has gone by
    pub fn tag_reached(&self) -> bool {
        self.seen_tag
    }
}
