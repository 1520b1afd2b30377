use crate::changelog::{ChangeSet, ChangeSetId, RanChangeSet};
use crate::filter::{FilterKind, FilterResult};
use std::collections::HashMap;

/// Rejects changesets the ledger says have already been applied
///
/// A ran changeset is accepted again if it is marked run-always, or if it is
/// marked run-on-change and its checksum no longer matches the ledger.
#[derive(Debug, Clone)]
pub struct ShouldRunChangeSetFilter {
    ran: HashMap<ChangeSetId, RanChangeSet>,
}

impl ShouldRunChangeSetFilter {
    /// Snapshot the ledger; later ledger writes do not affect this filter
    pub fn new(ran_change_sets: &[RanChangeSet]) -> Self {
        let ran = ran_change_sets
            .iter()
            .map(|ran| (ran.identity.clone(), ran.clone()))
            .collect();
        Self { ran }
    }

    pub fn accepts(&self, change_set: &ChangeSet) -> FilterResult {
        let Some(ran) = self.ran.get(change_set.identity()) else {
            return FilterResult::accept(FilterKind::ShouldRun, "Changeset has not run yet");
        };

        if change_set.is_run_always() {
            return FilterResult::accept(FilterKind::ShouldRun, "Changeset always runs");
        }

        if change_set.is_run_on_change() && ran.checksum_differs(change_set) {
            return FilterResult::accept(FilterKind::ShouldRun, "Changeset checksum changed");
        }

        FilterResult::reject(FilterKind::ShouldRun, "Changeset already ran")
    }
}
