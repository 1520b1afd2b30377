//! Read-only traversal reporting what an update would do

use crate::changelog::{ChangeLog, ChangeSet, ChangeSetId, RanChangeSet};
use crate::command::{UpdateSummary, UpdateSummaryReport};
use crate::filter::{ChangeSetFilter, FilterResult, TagBoundary};
use crate::iterator::{ChangeLogIterator, ChangeSetVisitor, RunSummary};
use serde::Serialize;
use std::convert::Infallible;

/// What an update would do with a changeset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeSetStatus {
    WouldApply,
    WouldSkip,
}

/// Status of one changeset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub change_set: ChangeSetId,
    pub description: Option<String>,
    pub status: ChangeSetStatus,
    /// The rejecting results; empty when the changeset would apply
    pub reasons: Vec<FilterResult>,
    /// The target tag had already been reached before this changeset
    pub past_target: bool,
}

/// Outcome of a status traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    entries: Vec<StatusEntry>,
    target_tag: Option<String>,
    tag_reached: bool,
    summary: RunSummary,
    #[serde(skip)]
    show_summary: UpdateSummary,
}

impl StatusReport {
    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }

    pub fn target_tag(&self) -> Option<&str> {
        self.target_tag.as_deref()
    }

    /// Whether the target tag's changeset was found; `false` without a target
    pub fn tag_reached(&self) -> bool {
        self.tag_reached
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Changesets an update would apply, in changelog order
    pub fn would_apply(&self) -> impl Iterator<Item = &ChangeSetId> {
        self.entries
            .iter()
            .filter(|e| e.status == ChangeSetStatus::WouldApply)
            .map(|e| &e.change_set)
    }

    pub fn would_apply_count(&self) -> usize {
        self.would_apply().count()
    }

    pub fn would_skip(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == ChangeSetStatus::WouldSkip)
    }

    /// Summary of the update this status predicts
    pub fn update_summary(&self) -> UpdateSummaryReport {
        UpdateSummaryReport::from_run_summary(&self.summary)
    }

    /// The predicted summary at the configured verbosity
    pub fn render_summary(&self) -> Option<String> {
        self.update_summary().render(self.show_summary)
    }

    pub(crate) fn with_show_summary(mut self, show_summary: UpdateSummary) -> Self {
        self.show_summary = show_summary;
        self
    }

    /// Entries up to and including the target tag (all entries without one)
    pub fn bounded_entries(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries.iter().filter(|e| !e.past_target)
    }
}

/// Classifies every changeset without touching the database
pub struct StatusChangeLogIterator<'a> {
    inner: ChangeLogIterator<'a>,
    boundary: Option<TagBoundary>,
}

impl<'a> StatusChangeLogIterator<'a> {
    /// `ran_change_sets` locates a target tag recorded by an earlier run
    pub fn new(
        change_log: &'a ChangeLog,
        target_tag: Option<String>,
        ran_change_sets: &[RanChangeSet],
        filters: impl IntoIterator<Item = ChangeSetFilter>,
    ) -> Self {
        Self {
            inner: ChangeLogIterator::new(change_log, filters),
            boundary: target_tag.map(|tag| TagBoundary::new(tag, ran_change_sets)),
        }
    }

    pub fn run(mut self) -> StatusReport {
        let mut visitor = StatusVisitor {
            boundary: self.boundary.as_ref(),
            tag_reached: false,
            entries: Vec::new(),
        };

        let summary = match self.inner.run(&mut visitor) {
            Ok(summary) => summary,
            Err(never) => match never {},
        };
        let StatusVisitor {
            tag_reached,
            entries,
            ..
        } = visitor;

        StatusReport {
            entries,
            target_tag: self.boundary.as_ref().map(|b| b.tag().to_string()),
            tag_reached,
            summary,
            show_summary: UpdateSummary::default(),
        }
    }
}

struct StatusVisitor<'t> {
    boundary: Option<&'t TagBoundary>,
    tag_reached: bool,
    entries: Vec<StatusEntry>,
}

impl StatusVisitor<'_> {
    fn record(&mut self, change_set: &ChangeSet, status: ChangeSetStatus, results: &[FilterResult]) {
        self.entries.push(StatusEntry {
            change_set: change_set.identity().clone(),
            description: change_set.description().map(str::to_string),
            status,
            reasons: results.iter().filter(|r| !r.is_accepted()).cloned().collect(),
            past_target: self.tag_reached,
        });

        if self.boundary.is_some_and(|boundary| boundary.is_boundary(change_set)) {
            self.tag_reached = true;
        }
    }
}

impl ChangeSetVisitor for StatusVisitor<'_> {
    type Error = Infallible;

    fn visit(&mut self, change_set: &ChangeSet, results: &[FilterResult]) -> Result<(), Infallible> {
        self.record(change_set, ChangeSetStatus::WouldApply, results);
        Ok(())
    }

    fn skip(&mut self, change_set: &ChangeSet, results: &[FilterResult]) -> Result<(), Infallible> {
        self.record(change_set, ChangeSetStatus::WouldSkip, results);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::ExecType;
    use crate::filter::{ShouldRunChangeSetFilter, UpToTagChangeSetFilter};
    use chrono::Utc;

    fn change_log() -> ChangeLog {
        ChangeLog::from_change_sets(
            "changelog.toml",
            ["a", "b", "c", "d"].into_iter().map(|id| {
                let builder = ChangeSet::builder(id, "alice", "changelog.toml");
                let builder = if id == "c" { builder.tag("release-1") } else { builder };
                builder.build().unwrap()
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_status_classifies_without_target() {
        let change_log = change_log();
        let ran = vec![RanChangeSet::from_change_set(
            &change_log.change_sets()[0],
            ExecType::Executed,
            1,
            "d-1",
            Utc::now(),
        )];
        let filters = vec![ChangeSetFilter::from(ShouldRunChangeSetFilter::new(&ran))];

        let report = StatusChangeLogIterator::new(&change_log, None, &ran, filters).run();

        let would_apply: Vec<&str> = report.would_apply().map(|id| id.id.as_str()).collect();
        assert_eq!(would_apply, vec!["b", "c", "d"]);
        let skipped = report.would_skip().next().unwrap();
        assert_eq!(skipped.reasons[0].message(), "Changeset already ran");
        assert!(!report.tag_reached());
        assert_eq!(report.bounded_entries().count(), 4);
    }

    #[test]
    fn test_status_tracks_target_tag() {
        let change_log = change_log();
        let filters = vec![ChangeSetFilter::from(UpToTagChangeSetFilter::new("release-1", &[]))];

        let report =
            StatusChangeLogIterator::new(&change_log, Some("release-1".to_string()), &[], filters).run();

        assert!(report.tag_reached());
        assert_eq!(report.would_apply_count(), 3);
        let bounded: Vec<&str> = report.bounded_entries().map(|e| e.change_set.id.as_str()).collect();
        assert_eq!(bounded, vec!["a", "b", "c"]);
        let after = &report.entries()[3];
        assert!(after.past_target);
        assert_eq!(after.reasons[0].mdc_name(), "afterTag");
    }

    #[test]
    fn test_status_target_matches_changeset_id() {
        let change_log = change_log();
        let filters = vec![ChangeSetFilter::from(UpToTagChangeSetFilter::new("b", &[]))];

        let report = StatusChangeLogIterator::new(&change_log, Some("b".to_string()), &[], filters).run();

        assert!(report.tag_reached());
        let would_apply: Vec<&str> = report.would_apply().map(|id| id.id.as_str()).collect();
        assert_eq!(would_apply, vec!["a", "b"]);
        let bounded: Vec<&str> = report.bounded_entries().map(|e| e.change_set.id.as_str()).collect();
        assert_eq!(bounded, vec!["a", "b"]);
    }

    #[test]
    fn test_status_with_missing_tag_is_unbounded() {
        let change_log = change_log();
        let filters = vec![ChangeSetFilter::from(UpToTagChangeSetFilter::new("nope", &[]))];

        let report = StatusChangeLogIterator::new(&change_log, Some("nope".to_string()), &[], filters).run();

        assert!(!report.tag_reached());
        assert_eq!(report.would_apply_count(), 4);
    }
}
