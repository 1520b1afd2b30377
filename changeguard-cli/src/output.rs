//! Terminal rendering of command results

use changeguard::command::ValidationFailure;
use changeguard::iterator::ChangeSetStatus;
use changeguard::{RanChangeSet, StatusReport, UpdateReport};
use colored::Colorize;
use std::fmt::Write;

/// Render a status report: what an update would apply and why the rest is skipped
pub fn render_status(report: &StatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n📊 Changelog Status\n");

    for entry in report.bounded_entries() {
        match entry.status {
            ChangeSetStatus::WouldApply => {
                let _ = write!(out, "  {} {}", "⏳".yellow(), entry.change_set);
            }
            ChangeSetStatus::WouldSkip => {
                let _ = write!(out, "  {} {}", "·".dimmed(), entry.change_set.to_string().dimmed());
            }
        }
        if let Some(description) = &entry.description {
            let _ = write!(out, " ({description})");
        }
        let _ = writeln!(out);
        for reason in &entry.reasons {
            let _ = writeln!(out, "      {}", reason.to_string().dimmed());
        }
    }

    let past_target = report.entries().len() - report.bounded_entries().count();
    if past_target > 0 {
        let _ = writeln!(out, "  … {past_target} changeset(s) after the target tag");
    }
    if let Some(tag) = report.target_tag() {
        if !report.tag_reached() {
            let _ = writeln!(
                out,
                "\n{} tag '{tag}' was not found, every pending changeset would be applied",
                "⚠️".yellow()
            );
        }
    }

    let _ = writeln!(
        out,
        "\n📈 Summary: {} would be applied, {} skipped",
        report.would_apply_count(),
        report.would_skip().count()
    );
    if let Some(summary) = report.render_summary() {
        let _ = writeln!(out);
        out.push_str(&summary);
    }
    out
}

/// Render the outcome of an update, including the summary at its configured verbosity
pub fn render_update(report: &UpdateReport) -> String {
    let mut out = String::new();
    if report.applied().is_empty() {
        let _ = writeln!(out, "{} No changesets to apply", "✅".green());
    } else {
        let _ = writeln!(
            out,
            "{} Successfully applied {} changeset(s) (deployment {})",
            "✅".green(),
            report.applied().len(),
            report.deployment_id()
        );
        for ran in report.applied() {
            let _ = writeln!(out, "  ✓ {} [{}]", ran.identity, ran.exec_type.as_str());
        }
    }
    if let Some(summary) = report.render_summary() {
        let _ = writeln!(out);
        out.push_str(&summary);
    }
    out
}

/// Render the ledger in execution order
pub fn render_history(ran_change_sets: &[RanChangeSet]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n📋 Ledger History\n");
    if ran_change_sets.is_empty() {
        let _ = writeln!(out, "No changesets have been applied");
        return out;
    }

    let mut ordered: Vec<&RanChangeSet> = ran_change_sets.iter().collect();
    ordered.sort_by_key(|ran| ran.order_executed);
    for ran in ordered {
        let _ = write!(
            out,
            "  {:>4}. {} {} {}",
            ran.order_executed,
            ran.date_executed.format("%Y-%m-%d %H:%M:%S"),
            ran.exec_type.as_str(),
            ran.identity
        );
        if let Some(tag) = &ran.tag {
            let _ = write!(out, " {}", format!("tag={tag}").cyan());
        }
        if let Some(deployment_id) = &ran.deployment_id {
            let _ = write!(out, " {}", format!("deployment={deployment_id}").dimmed());
        }
        let _ = writeln!(out);
    }
    out
}

pub fn render_validation(failures: &[ValidationFailure]) -> String {
    let mut out = String::new();
    if failures.is_empty() {
        let _ = writeln!(out, "{} All checksums valid", "✅".green());
        return out;
    }
    let _ = writeln!(out, "{} {} changeset(s) failed validation:", "❌".red(), failures.len());
    for failure in failures {
        let _ = writeln!(out, "  ✗ {failure}");
    }
    out
}

/// Pretty-printed JSON for `--json` output
pub fn to_json<T: serde::Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}
