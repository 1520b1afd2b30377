//! Changeset filters
//!
//! A filter looks at one changeset at a time and returns a [`FilterResult`]
//! explaining whether it accepts it. Some filters are stateful: the count filter
//! counts every changeset it is shown and the tag filter remembers whether the
//! target tag has gone by. For that reason a filter must be shown every changeset
//! of a run, in changelog order, even after another filter rejected it, and a
//! filter instance belongs to exactly one run.
//!
//! The set of filters is closed, so they are variants of [`ChangeSetFilter`]
//! rather than trait objects.

mod context;
mod count;
mod dbms;
mod ignore;
mod label;
mod should_run;
mod up_to_tag;

pub use context::ContextChangeSetFilter;
pub use count::CountChangeSetFilter;
pub use dbms::DbmsChangeSetFilter;
pub use ignore::IgnoreChangeSetFilter;
pub use label::LabelChangeSetFilter;
pub use should_run::ShouldRunChangeSetFilter;
pub use up_to_tag::{TagBoundary, UpToTagChangeSetFilter};

use crate::changelog::ChangeSet;
use serde::Serialize;
use std::fmt;

/// Which filter produced a [`FilterResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FilterKind {
    ShouldRun,
    Context,
    Label,
    Dbms,
    Ignore,
    UpToTag,
    Count,
}

impl FilterKind {
    /// Stable machine-readable tag used as the MDC value for skip reasons
    pub fn mdc_name(self) -> &'static str {
        match self {
            FilterKind::ShouldRun => "alreadyRan",
            FilterKind::Context => "contextMismatch",
            FilterKind::Label => "labelsMismatch",
            FilterKind::Dbms => "dbmsMismatch",
            FilterKind::Ignore => "ignored",
            FilterKind::UpToTag => "afterTag",
            FilterKind::Count => "afterCount",
        }
    }

    /// Human-readable category used in update summaries
    pub fn display_name(self) -> &'static str {
        match self {
            FilterKind::ShouldRun => "Already ran",
            FilterKind::Context => "Context mismatch",
            FilterKind::Label => "Label mismatch",
            FilterKind::Dbms => "DBMS mismatch",
            FilterKind::Ignore => "Ignored",
            FilterKind::UpToTag => "After tag",
            FilterKind::Count => "After count",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One filter's verdict on one changeset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterResult {
    accepted: bool,
    message: String,
    filter: FilterKind,
    mdc_name: &'static str,
}

impl FilterResult {
    pub fn new(accepted: bool, message: impl Into<String>, filter: FilterKind) -> Self {
        Self {
            accepted,
            message: message.into(),
            filter,
            mdc_name: filter.mdc_name(),
        }
    }

    pub fn accept(filter: FilterKind, message: impl Into<String>) -> Self {
        Self::new(true, message, filter)
    }

    pub fn reject(filter: FilterKind, message: impl Into<String>) -> Self {
        Self::new(false, message, filter)
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn filter(&self) -> FilterKind {
        self.filter
    }

    pub fn mdc_name(&self) -> &'static str {
        self.mdc_name
    }
}

impl fmt::Display for FilterResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.filter, self.message)
    }
}

/// A filter in a chain
#[derive(Debug, Clone)]
pub enum ChangeSetFilter {
    ShouldRun(ShouldRunChangeSetFilter),
    Context(ContextChangeSetFilter),
    Label(LabelChangeSetFilter),
    Dbms(DbmsChangeSetFilter),
    Ignore(IgnoreChangeSetFilter),
    UpToTag(UpToTagChangeSetFilter),
    Count(CountChangeSetFilter),
}

impl ChangeSetFilter {
    /// Evaluate the filter, updating its state if it is stateful
    pub fn accepts(&mut self, change_set: &ChangeSet) -> FilterResult {
        match self {
            ChangeSetFilter::ShouldRun(f) => f.accepts(change_set),
            ChangeSetFilter::Context(f) => f.accepts(change_set),
            ChangeSetFilter::Label(f) => f.accepts(change_set),
            ChangeSetFilter::Dbms(f) => f.accepts(change_set),
            ChangeSetFilter::Ignore(f) => f.accepts(change_set),
            ChangeSetFilter::UpToTag(f) => f.accepts(change_set),
            ChangeSetFilter::Count(f) => f.accepts(change_set),
        }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            ChangeSetFilter::ShouldRun(_) => FilterKind::ShouldRun,
            ChangeSetFilter::Context(_) => FilterKind::Context,
            ChangeSetFilter::Label(_) => FilterKind::Label,
            ChangeSetFilter::Dbms(_) => FilterKind::Dbms,
            ChangeSetFilter::Ignore(_) => FilterKind::Ignore,
            ChangeSetFilter::UpToTag(_) => FilterKind::UpToTag,
            ChangeSetFilter::Count(_) => FilterKind::Count,
        }
    }

    pub fn mdc_name(&self) -> &'static str {
        self.kind().mdc_name()
    }
}

macro_rules! impl_from_filter {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ChangeSetFilter {
                fn from(filter: $ty) -> Self {
                    ChangeSetFilter::$variant(filter)
                }
            }
        )*
    };
}

impl_from_filter! {
    ShouldRun => ShouldRunChangeSetFilter,
    Context => ContextChangeSetFilter,
    Label => LabelChangeSetFilter,
    Dbms => DbmsChangeSetFilter,
    Ignore => IgnoreChangeSetFilter,
    UpToTag => UpToTagChangeSetFilter,
    Count => CountChangeSetFilter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mdc_names_are_unique() {
        let kinds = [
            FilterKind::ShouldRun,
            FilterKind::Context,
            FilterKind::Label,
            FilterKind::Dbms,
            FilterKind::Ignore,
            FilterKind::UpToTag,
            FilterKind::Count,
        ];
        let names: std::collections::HashSet<_> = kinds.iter().map(|k| k.mdc_name()).collect();
        assert_eq!(names.len(), kinds.len());
    }

    #[test]
    fn test_filter_result_carries_mdc_name() {
        let result = FilterResult::reject(FilterKind::UpToTag, "Changeset is after tag 'v1'");
        assert!(!result.is_accepted());
        assert_eq!(result.mdc_name(), "afterTag");
        assert_eq!(result.to_string(), "After tag: Changeset is after tag 'v1'");
    }

    #[test]
    fn test_enum_dispatch_reports_kind() {
        let mut filter: ChangeSetFilter = CountChangeSetFilter::new(1).into();
        assert_eq!(filter.kind(), FilterKind::Count);
        assert_eq!(filter.mdc_name(), "afterCount");

        let cs = ChangeSet::builder("1", "alice", "changelog.toml").build().unwrap();
        assert!(filter.accepts(&cs).is_accepted());
        assert!(!filter.accepts(&cs).is_accepted());
    }
}
