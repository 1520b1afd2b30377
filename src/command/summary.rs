//! Update summary verbosity and rendering

use crate::changelog::ChangeSetId;
use crate::filter::{FilterKind, FilterResult};
use crate::iterator::RunSummary;
use crate::{ChangeguardError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// How much of the update summary to show
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateSummary {
    #[default]
    Off,
    /// Counts only
    Summary,
    /// Counts, the per-filter breakdown and every filtered changeset
    Verbose,
}

impl UpdateSummary {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateSummary::Off => "off",
            UpdateSummary::Summary => "summary",
            UpdateSummary::Verbose => "verbose",
        }
    }
}

impl fmt::Display for UpdateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive; an empty value means the default (`off`)
impl FromStr for UpdateSummary {
    type Err = ChangeguardError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "off" => Ok(UpdateSummary::Off),
            "summary" => Ok(UpdateSummary::Summary),
            "verbose" => Ok(UpdateSummary::Verbose),
            _ => Err(ChangeguardError::Configuration(format!(
                "Illegal value '{value}' for show_summary. Valid values are 'off', 'summary', or 'verbose'"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for UpdateSummary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// A changeset that was filtered out, with the results that rejected it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilteredChangeSet {
    pub change_set: ChangeSetId,
    pub reasons: Vec<FilterResult>,
}

/// Counts of one run, split the way users read them
///
/// A rejected changeset counts as "previously run" if the should-run filter
/// rejected it, and as "filtered out" otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummaryReport {
    pub run: usize,
    pub previously_run: usize,
    pub filtered_out: usize,
    /// Filtered-out changesets per rejecting filter; one changeset can count
    /// under several filters
    pub filtered_by: BTreeMap<FilterKind, usize>,
    pub filtered: Vec<FilteredChangeSet>,
}

const LABEL_WIDTH: usize = 30;

impl UpdateSummaryReport {
    pub fn from_run_summary(summary: &RunSummary) -> Self {
        let mut report = Self {
            run: summary.accepted_count(),
            ..Self::default()
        };

        for decision in summary.rejected() {
            let already_ran = decision.rejections().any(|r| r.filter() == FilterKind::ShouldRun);
            if already_ran {
                report.previously_run += 1;
                continue;
            }

            report.filtered_out += 1;
            let mut kinds: Vec<FilterKind> = decision.rejections().map(FilterResult::filter).collect();
            kinds.dedup();
            for kind in kinds {
                *report.filtered_by.entry(kind).or_default() += 1;
            }
            report.filtered.push(FilteredChangeSet {
                change_set: decision.change_set.clone(),
                reasons: decision.rejections().cloned().collect(),
            });
        }

        report
    }

    pub fn total(&self) -> usize {
        self.run + self.previously_run + self.filtered_out
    }

    /// The summary text, or `None` when `verbosity` is off
    pub fn render(&self, verbosity: UpdateSummary) -> Option<String> {
        if verbosity == UpdateSummary::Off {
            return None;
        }

        let mut out = String::new();
        let _ = writeln!(out, "UPDATE SUMMARY");
        let _ = writeln!(out, "{:<LABEL_WIDTH$}{}", "Run:", self.run);
        let _ = writeln!(out, "{:<LABEL_WIDTH$}{}", "Previously run:", self.previously_run);
        let _ = writeln!(out, "{:<LABEL_WIDTH$}{}", "Filtered out:", self.filtered_out);
        let _ = writeln!(out, "{}", "-".repeat(LABEL_WIDTH + 5));
        let _ = writeln!(out, "{:<LABEL_WIDTH$}{}", "Total change sets:", self.total());

        if verbosity == UpdateSummary::Verbose && self.filtered_out > 0 {
            let _ = writeln!(out);
            let _ = writeln!(out, "FILTERED CHANGE SETS SUMMARY");
            for (kind, count) in &self.filtered_by {
                let _ = writeln!(out, "{:<LABEL_WIDTH$}{}", format!("{kind}:"), count);
            }
            let _ = writeln!(out);
            for filtered in &self.filtered {
                let _ = writeln!(out, "{}", filtered.change_set);
                for reason in &filtered.reasons {
                    let _ = writeln!(out, "    {reason}");
                }
            }
        }

        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::{ChangeLog, ChangeSet, Contexts, ExecType, RanChangeSet};
    use crate::filter::{ChangeSetFilter, ContextChangeSetFilter, ShouldRunChangeSetFilter};
    use crate::iterator::{ChangeLogIterator, ChangeSetVisitor};
    use chrono::Utc;
    use rstest::rstest;

    #[rstest]
    #[case("off", UpdateSummary::Off)]
    #[case("SUMMARY", UpdateSummary::Summary)]
    #[case(" Verbose ", UpdateSummary::Verbose)]
    #[case("", UpdateSummary::Off)]
    fn test_parse_update_summary(#[case] value: &str, #[case] expected: UpdateSummary) {
        assert_eq!(value.parse::<UpdateSummary>().unwrap(), expected);
    }

    #[rstest]
    #[case("loud")]
    #[case("full")]
    #[case("summaries")]
    fn test_parse_rejects_unknown_values(#[case] value: &str) {
        let err = value.parse::<UpdateSummary>().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains(value));
    }

    struct Noop;

    impl ChangeSetVisitor for Noop {
        type Error = ();

        fn visit(&mut self, _change_set: &ChangeSet, _results: &[FilterResult]) -> std::result::Result<(), ()> {
            Ok(())
        }
    }

    fn run_summary() -> RunSummary {
        let change_log = ChangeLog::from_change_sets(
            "changelog.toml",
            [("1", ""), ("2", ""), ("3", "prod"), ("4", "")].into_iter().map(|(id, ctx)| {
                ChangeSet::builder(id, "alice", "changelog.toml")
                    .contexts(ctx)
                    .build()
                    .unwrap()
            }),
        )
        .unwrap();
        let ran = vec![RanChangeSet::from_change_set(
            &change_log.change_sets()[0],
            ExecType::Executed,
            1,
            "d-1",
            Utc::now(),
        )];
        let filters = vec![
            ChangeSetFilter::from(ShouldRunChangeSetFilter::new(&ran)),
            ContextChangeSetFilter::new(Contexts::parse("dev")).into(),
        ];
        ChangeLogIterator::new(&change_log, filters).run(&mut Noop).unwrap()
    }

    fn has_line(text: &str, words: &[&str]) -> bool {
        text.lines()
            .any(|line| line.split_whitespace().collect::<Vec<_>>() == words)
    }

    #[test]
    fn test_counts() {
        let report = UpdateSummaryReport::from_run_summary(&run_summary());
        assert_eq!(report.run, 2);
        assert_eq!(report.previously_run, 1);
        assert_eq!(report.filtered_out, 1);
        assert_eq!(report.total(), 4);
        assert_eq!(report.filtered_by.get(&FilterKind::Context), Some(&1));
        assert_eq!(report.filtered[0].change_set.id, "3");
    }

    #[test]
    fn test_render_by_verbosity() {
        let report = UpdateSummaryReport::from_run_summary(&run_summary());

        assert_eq!(report.render(UpdateSummary::Off), None);

        let summary = report.render(UpdateSummary::Summary).unwrap();
        assert!(summary.starts_with("UPDATE SUMMARY"));
        assert!(has_line(&summary, &["Run:", "2"]));
        assert!(has_line(&summary, &["Previously", "run:", "1"]));
        assert!(has_line(&summary, &["Total", "change", "sets:", "4"]));
        assert!(!summary.contains("FILTERED CHANGE SETS SUMMARY"));

        let verbose = report.render(UpdateSummary::Verbose).unwrap();
        assert!(verbose.contains("FILTERED CHANGE SETS SUMMARY"));
        assert!(has_line(&verbose, &["Context", "mismatch:", "1"]));
        assert!(verbose.contains("changelog.toml::3::alice"));
        assert!(verbose.contains("Context mismatch: Context does not match 'dev'"));
    }
}
