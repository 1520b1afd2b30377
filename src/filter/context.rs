use crate::changelog::{ChangeSet, Contexts};
use crate::filter::{FilterKind, FilterResult};

/// Matches a changeset's context expression against the runtime contexts
#[derive(Debug, Clone)]
pub struct ContextChangeSetFilter {
    contexts: Contexts,
}

impl ContextChangeSetFilter {
    pub fn new(contexts: Contexts) -> Self {
        Self { contexts }
    }

    pub fn accepts(&self, change_set: &ChangeSet) -> FilterResult {
        if self.contexts.is_empty() {
            return FilterResult::accept(
                FilterKind::Context,
                "No runtime context specified, all contexts will run",
            );
        }

        let expression = change_set.contexts();
        if expression.is_empty() {
            return FilterResult::accept(FilterKind::Context, "Changeset runs under all contexts");
        }

        if expression.matches(&self.contexts) {
            FilterResult::accept(
                FilterKind::Context,
                format!("Context matches '{}'", self.contexts),
            )
        } else {
            FilterResult::reject(
                FilterKind::Context,
                format!("Context does not match '{}'", self.contexts),
            )
        }
    }
}
