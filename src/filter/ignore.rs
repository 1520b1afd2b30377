use crate::changelog::ChangeSet;
use crate::filter::{FilterKind, FilterResult};

/// Rejects changesets marked `ignore`
#[derive(Debug, Clone, Default)]
pub struct IgnoreChangeSetFilter;

impl IgnoreChangeSetFilter {
    pub fn new() -> Self {
        Self
    }

    pub fn accepts(&self, change_set: &ChangeSet) -> FilterResult {
        if change_set.is_ignored() {
            FilterResult::reject(FilterKind::Ignore, "Changeset is ignored")
        } else {
            FilterResult::accept(FilterKind::Ignore, "Changeset is not ignored")
        }
    }
}
