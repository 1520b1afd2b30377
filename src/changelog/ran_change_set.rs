//! `RanChangeSet` - entries of the ledger table

use crate::changelog::{ChangeSet, ChangeSetId, CheckSum};
use crate::error::{ChangeguardError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a changeset ended up in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecType {
    Executed,
    Failed,
    Skipped,
    Reran,
    MarkRan,
}

impl ExecType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecType::Executed => "EXECUTED",
            ExecType::Failed => "FAILED",
            ExecType::Skipped => "SKIPPED",
            ExecType::Reran => "RERAN",
            ExecType::MarkRan => "MARK_RAN",
        }
    }
}

impl fmt::Display for ExecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecType {
    type Err = ChangeguardError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "EXECUTED" => Ok(ExecType::Executed),
            "FAILED" => Ok(ExecType::Failed),
            "SKIPPED" => Ok(ExecType::Skipped),
            "RERAN" => Ok(ExecType::Reran),
            "MARK_RAN" => Ok(ExecType::MarkRan),
            other => Err(ChangeguardError::database(format!(
                "Unknown exec type '{other}' in ledger"
            ))),
        }
    }
}

/// Record of a changeset previously applied to a database
///
/// This struct matches the columns of the ledger table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RanChangeSet {
    /// Identity of the applied changeset
    pub identity: ChangeSetId,

    /// Checksum at the time of execution; `None` once cleared, which matches anything
    pub checksum: Option<CheckSum>,

    /// When the changeset was (last) applied
    pub date_executed: DateTime<Utc>,

    /// Monotonic execution sequence within the ledger
    pub order_executed: i32,

    pub exec_type: ExecType,

    /// Tag recorded on this row, if the changeset established one
    pub tag: Option<String>,

    pub description: Option<String>,

    /// Identifier shared by every changeset applied in the same run
    pub deployment_id: Option<String>,

    /// Context expression as declared when applied
    pub contexts: Option<String>,

    /// Labels as declared when applied
    pub labels: Option<String>,
}

impl RanChangeSet {
    /// Build the ledger row for a changeset that has just been applied
    pub fn from_change_set(
        change_set: &ChangeSet,
        exec_type: ExecType,
        order_executed: i32,
        deployment_id: &str,
        date_executed: DateTime<Utc>,
    ) -> Self {
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };

        Self {
            identity: change_set.identity().clone(),
            checksum: Some(change_set.checksum().clone()),
            date_executed,
            order_executed,
            exec_type,
            tag: change_set.tag().map(str::to_string),
            description: change_set.description().map(str::to_string),
            deployment_id: Some(deployment_id.to_string()),
            contexts: non_empty(change_set.contexts().to_string()),
            labels: non_empty(change_set.labels().to_string()),
        }
    }

    /// Whether this row records the given changeset
    pub fn is_same_as(&self, change_set: &ChangeSet) -> bool {
        &self.identity == change_set.identity()
    }

    /// Whether the stored checksum disagrees with the changeset's current one
    ///
    /// A cleared (missing) stored checksum never counts as a mismatch.
    pub fn checksum_differs(&self, change_set: &ChangeSet) -> bool {
        match &self.checksum {
            Some(stored) => stored != change_set.checksum(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change_set(sql: &str) -> ChangeSet {
        ChangeSet::builder("1", "alice", "db/changelog.toml")
            .statement(sql)
            .contexts("dev")
            .build()
            .unwrap()
    }

    #[test]
    fn test_exec_type_round_trips_through_ledger_text() {
        for exec_type in [
            ExecType::Executed,
            ExecType::Failed,
            ExecType::Skipped,
            ExecType::Reran,
            ExecType::MarkRan,
        ] {
            assert_eq!(exec_type.as_str().parse::<ExecType>().unwrap(), exec_type);
        }
        assert!("BOGUS".parse::<ExecType>().is_err());
    }

    #[test]
    fn test_from_change_set_copies_identity_and_metadata() {
        let cs = change_set("CREATE TABLE a (id INT)");
        let ran = RanChangeSet::from_change_set(&cs, ExecType::Executed, 7, "d-1", Utc::now());
        assert!(ran.is_same_as(&cs));
        assert_eq!(ran.order_executed, 7);
        assert_eq!(ran.contexts.as_deref(), Some("dev"));
        assert_eq!(ran.labels, None);
        assert!(!ran.checksum_differs(&cs));
    }

    #[test]
    fn test_checksum_differs_ignores_cleared_checksum() {
        let original = change_set("CREATE TABLE a (id INT)");
        let edited = change_set("CREATE TABLE a (id BIGINT)");
        let mut ran = RanChangeSet::from_change_set(&original, ExecType::Executed, 1, "d-1", Utc::now());
        assert!(ran.checksum_differs(&edited));

        ran.checksum = None;
        assert!(!ran.checksum_differs(&edited));
    }
}
