//! Changelog traversal
//!
//! [`ChangeLogIterator`] walks a changelog in order and shows every changeset
//! to every filter of its chain. The overall verdict is the AND of all results,
//! computed only after all filters have run, so stateful filters see the full
//! sequence. Accepted changesets go to [`ChangeSetVisitor::visit`], rejected
//! ones to [`ChangeSetVisitor::skip`].
//!
//! The same traversal backs both execution (a visitor that applies and records
//! changesets) and status reporting ([`StatusChangeLogIterator`]).

mod status;

pub use status::{ChangeSetStatus, StatusChangeLogIterator, StatusEntry, StatusReport};

use crate::changelog::{ChangeLog, ChangeSet, ChangeSetId};
use crate::filter::{ChangeSetFilter, FilterResult};
use serde::Serialize;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Callback invoked for each changeset once the chain has decided on it
pub trait ChangeSetVisitor {
    /// Error that stops the traversal
    type Error;

    /// Called for a changeset every filter accepted
    fn visit(&mut self, change_set: &ChangeSet, results: &[FilterResult]) -> Result<(), Self::Error>;

    /// Called for a changeset at least one filter rejected
    fn skip(&mut self, change_set: &ChangeSet, results: &[FilterResult]) -> Result<(), Self::Error> {
        let _ = (change_set, results);
        Ok(())
    }
}

/// Everything the chain said about one changeset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSetDecision {
    pub change_set: ChangeSetId,
    pub accepted: bool,
    pub results: Vec<FilterResult>,
}

impl ChangeSetDecision {
    /// The results that rejected the changeset
    pub fn rejections(&self) -> impl Iterator<Item = &FilterResult> {
        self.results.iter().filter(|r| !r.is_accepted())
    }
}

/// Per-changeset decisions of one traversal, in changelog order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    decisions: Vec<ChangeSetDecision>,
    accepted: usize,
    rejected: usize,
}

impl RunSummary {
    fn record(&mut self, decision: ChangeSetDecision) {
        if decision.accepted {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
        self.decisions.push(decision);
    }

    pub fn decisions(&self) -> &[ChangeSetDecision] {
        &self.decisions
    }

    pub fn decision_for(&self, change_set: &ChangeSetId) -> Option<&ChangeSetDecision> {
        self.decisions.iter().find(|d| &d.change_set == change_set)
    }

    pub fn results_for(&self, change_set: &ChangeSetId) -> Option<&[FilterResult]> {
        self.decision_for(change_set).map(|d| d.results.as_slice())
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected
    }

    pub fn total(&self) -> usize {
        self.decisions.len()
    }

    /// Identities of accepted changesets, in changelog order
    pub fn accepted(&self) -> impl Iterator<Item = &ChangeSetId> {
        self.decisions.iter().filter(|d| d.accepted).map(|d| &d.change_set)
    }

    /// Decisions of rejected changesets, in changelog order
    pub fn rejected(&self) -> impl Iterator<Item = &ChangeSetDecision> {
        self.decisions.iter().filter(|d| !d.accepted)
    }
}

/// Drives a changelog through a filter chain
///
/// Build a new iterator (and new filters) for every run: filters keep state.
pub struct ChangeLogIterator<'a> {
    change_log: &'a ChangeLog,
    filters: Vec<ChangeSetFilter>,
}

impl<'a> ChangeLogIterator<'a> {
    pub fn new(change_log: &'a ChangeLog, filters: impl IntoIterator<Item = ChangeSetFilter>) -> Self {
        Self {
            change_log,
            filters: filters.into_iter().collect(),
        }
    }

    pub fn change_log(&self) -> &'a ChangeLog {
        self.change_log
    }

    pub fn filters(&self) -> &[ChangeSetFilter] {
        &self.filters
    }

    /// Traverse the changelog, stopping at the first visitor error
    ///
    /// Changesets visited before the error keep whatever effect the visitor
    /// had on them.
    pub fn run<V: ChangeSetVisitor>(&mut self, visitor: &mut V) -> Result<RunSummary, V::Error> {
        let mut summary = RunSummary::default();

        for change_set in self.change_log.iter() {
            #[cfg(feature = "tracing")]
            let span = tracing_helpers::change_set_span(change_set.identity()).entered();

            let results = self.evaluate(change_set);
            let accepted = results.iter().all(FilterResult::is_accepted);

            #[cfg(feature = "tracing")]
            tracing_helpers::record_decision(&span, accepted, &results);

            if accepted {
                log::debug!("Changeset {} accepted by all filters", change_set.identity());
                visitor.visit(change_set, &results)?;
            } else {
                log::debug!(
                    "Changeset {} rejected: {}",
                    change_set.identity(),
                    describe_rejections(&results)
                );
                visitor.skip(change_set, &results)?;
            }

            summary.record(ChangeSetDecision {
                change_set: change_set.identity().clone(),
                accepted,
                results,
            });
        }

        Ok(summary)
    }

    /// Show the changeset to every filter; no short-circuit
    fn evaluate(&mut self, change_set: &ChangeSet) -> Vec<FilterResult> {
        self.filters
            .iter_mut()
            .map(|filter| filter.accepts(change_set))
            .collect()
    }
}

/// `"Already ran: Changeset already ran; After tag: ..."`
pub fn describe_rejections(results: &[FilterResult]) -> String {
    results
        .iter()
        .filter(|r| !r.is_accepted())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
