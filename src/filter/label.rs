use crate::changelog::{ChangeSet, LabelExpression};
use crate::filter::{FilterKind, FilterResult};

/// Matches the runtime label expression against a changeset's labels
#[derive(Debug, Clone)]
pub struct LabelChangeSetFilter {
    expression: LabelExpression,
}

impl LabelChangeSetFilter {
    pub fn new(expression: LabelExpression) -> Self {
        Self { expression }
    }

    pub fn accepts(&self, change_set: &ChangeSet) -> FilterResult {
        if self.expression.is_empty() {
            return FilterResult::accept(
                FilterKind::Label,
                "No runtime labels specified, all labels will run",
            );
        }

        if change_set.labels().is_empty() {
            return FilterResult::accept(FilterKind::Label, "Changeset runs under all labels");
        }

        if self.expression.matches(change_set.labels()) {
            FilterResult::accept(
                FilterKind::Label,
                format!("Labels matches '{}'", self.expression),
            )
        } else {
            FilterResult::reject(
                FilterKind::Label,
                format!("Labels does not match '{}'", self.expression),
            )
        }
    }
}
