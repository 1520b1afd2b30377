//! Checksum validation of applied changesets

use crate::changelog::{ChangeLog, ChangeSetId, CheckSum, RanChangeSet};
use crate::{ChangeguardError, Result};
use serde::Serialize;
use std::fmt;

/// An applied changeset whose content changed since it ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub change_set: ChangeSetId,
    pub stored: CheckSum,
    pub current: CheckSum,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} was modified after it ran (stored checksum {}, current {})",
            self.change_set, self.stored, self.current
        )
    }
}

/// Compare every ledger row still present in the changelog with its changeset
///
/// Run-on-change, run-always and ignored changesets are allowed to change, as
/// are rows whose checksum was cleared.
pub fn validate_checksums(change_log: &ChangeLog, ran_change_sets: &[RanChangeSet]) -> Vec<ValidationFailure> {
    ran_change_sets
        .iter()
        .filter_map(|ran| {
            let change_set = change_log.get(&ran.identity)?;
            if change_set.is_run_on_change() || change_set.is_run_always() || change_set.is_ignored() {
                return None;
            }
            let stored = ran.checksum.as_ref()?;
            (stored != change_set.checksum()).then(|| ValidationFailure {
                change_set: ran.identity.clone(),
                stored: stored.clone(),
                current: change_set.checksum().clone(),
            })
        })
        .collect()
}

/// Fail with [`ChangeguardError::ValidationFailed`] if any checksum disagrees
pub fn ensure_valid(change_log: &ChangeLog, ran_change_sets: &[RanChangeSet]) -> Result<()> {
    let failures = validate_checksums(change_log, ran_change_sets);
    if failures.is_empty() {
        return Ok(());
    }
    for failure in &failures {
        log::error!("{failure}");
    }
    Err(ChangeguardError::ValidationFailed(failures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::{ChangeSet, ExecType};
    use chrono::Utc;

    fn change_log(sql: &str, run_on_change: bool) -> ChangeLog {
        ChangeLog::from_change_sets(
            "changelog.toml",
            [ChangeSet::builder("1", "alice", "changelog.toml")
                .statement(sql)
                .run_on_change(run_on_change)
                .build()
                .unwrap()],
        )
        .unwrap()
    }

    fn ran(change_log: &ChangeLog) -> RanChangeSet {
        RanChangeSet::from_change_set(&change_log.change_sets()[0], ExecType::Executed, 1, "d-1", Utc::now())
    }

    #[test]
    fn test_unchanged_changelog_is_valid() {
        let log = change_log("CREATE TABLE a (id INT)", false);
        assert!(ensure_valid(&log, &[ran(&log)]).is_ok());
    }

    #[test]
    fn test_modified_changeset_fails() {
        let original = change_log("CREATE TABLE a (id INT)", false);
        let modified = change_log("CREATE TABLE a (id BIGINT)", false);

        let err = ensure_valid(&modified, &[ran(&original)]).unwrap_err();
        match err {
            ChangeguardError::ValidationFailed(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].change_set.id, "1");
                assert_eq!(&failures[0].current, modified.change_sets()[0].checksum());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_run_on_change_and_cleared_checksums_are_exempt() {
        let original = change_log("CREATE VIEW v AS SELECT 1", true);
        let modified = change_log("CREATE VIEW v AS SELECT 2", true);
        assert!(validate_checksums(&modified, &[ran(&original)]).is_empty());

        let modified = change_log("CREATE VIEW v AS SELECT 2", false);
        let mut cleared = ran(&original);
        cleared.checksum = None;
        assert!(validate_checksums(&modified, &[cleared]).is_empty());
    }

    #[test]
    fn test_rows_missing_from_changelog_are_ignored() {
        let log = change_log("SELECT 1", false);
        let mut other = ran(&log);
        other.identity = ChangeSetId::new("99", "bob", "other.toml");
        assert!(validate_checksums(&log, &[other]).is_empty());
    }
}
