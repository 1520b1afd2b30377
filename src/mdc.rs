//! Audit metadata attached to every command run
//!
//! Keys are stable so log pipelines can correlate runs, operations and skip
//! reasons. Filter-level reasons use [`crate::filter::FilterKind::mdc_name`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Well-known metadata keys
pub struct MdcKey;

impl MdcKey {
    pub const COMMAND_NAME: &'static str = "commandName";
    pub const OPERATION: &'static str = "operation";
    pub const DEPLOYMENT_ID: &'static str = "deploymentId";
    pub const DATABASE: &'static str = "database";
    pub const CHANGELOG_FILE: &'static str = "changelogFile";
    pub const UPDATE_TO_TAG: &'static str = "updateToTag";
    pub const UPDATE_COUNT: &'static str = "updateCount";
    pub const UPDATE_OUTCOME: &'static str = "updateOutcome";
    pub const CHANGESETS_APPLIED: &'static str = "changesetsApplied";
    pub const CHANGESETS_SKIPPED: &'static str = "changesetsSkipped";
    pub const CHANGESET_ID: &'static str = "changesetId";
    pub const CHANGESET_AUTHOR: &'static str = "changesetAuthor";
    pub const CHANGESET_PATH: &'static str = "changesetFilepath";
    pub const CHANGESET_OUTCOME: &'static str = "changesetOutcome";
}

/// Ordered key/value metadata for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AuditMetadata {
    values: BTreeMap<&'static str, String>,
}

impl AuditMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any earlier one for the same key
    pub fn add(&mut self, key: &'static str, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for AuditMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}
