//! TOML changelog files
//!
//! A changelog file lists changesets in apply order:
//!
//! ```toml
//! [[changeset]]
//! id = "1"
//! author = "alice"
//! description = "Create the account table"
//! contexts = "prod or test"
//! labels = "billing"
//! dbms = "postgresql"
//! sql = "CREATE TABLE account (id BIGINT PRIMARY KEY)"
//!
//! [[changeset]]
//! id = "2"
//! author = "alice"
//! tag = "v1.0"
//! sql = [
//!     "ALTER TABLE account ADD COLUMN name TEXT",
//!     "CREATE INDEX account_name ON account (name)",
//! ]
//! ```

use changeguard::{ChangeLog, ChangeSet, ChangeguardError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChangelogFileError {
    #[error("Failed to read changelog file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse changelog file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid changeset #{position} in {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        position: usize,
        #[source]
        source: ChangeguardError,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChangelogDocument {
    #[serde(default, rename = "changeset")]
    change_sets: Vec<ChangeSetEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChangeSetEntry {
    id: String,
    author: String,
    description: Option<String>,
    #[serde(default)]
    contexts: String,
    #[serde(default)]
    labels: String,
    #[serde(default)]
    dbms: String,
    #[serde(default)]
    run_always: bool,
    #[serde(default)]
    run_on_change: bool,
    #[serde(default)]
    ignore: bool,
    tag: Option<String>,
    #[serde(default)]
    sql: Sql,
}

#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum Sql {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl Sql {
    fn into_statements(self) -> Vec<String> {
        match self {
            Sql::None => Vec::new(),
            Sql::One(sql) => vec![sql],
            Sql::Many(statements) => statements,
        }
    }
}

/// Read and parse a changelog file
pub fn load(path: impl AsRef<Path>) -> Result<ChangeLog, ChangelogFileError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| ChangelogFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let change_log = parse(path, &source)?;
    log::debug!("Loaded {} changeset(s) from {}", change_log.len(), path.display());
    Ok(change_log)
}

/// Parse changelog TOML; `path` becomes part of every changeset identity
pub fn parse(path: impl AsRef<Path>, source: &str) -> Result<ChangeLog, ChangelogFileError> {
    let path = path.as_ref();
    let document: ChangelogDocument = toml::from_str(source).map_err(|source| ChangelogFileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let path_str = path.to_string_lossy();
    let mut change_log = ChangeLog::new(path_str.as_ref());
    for (index, entry) in document.change_sets.into_iter().enumerate() {
        let invalid = |source: ChangeguardError| ChangelogFileError::Invalid {
            path: path.to_path_buf(),
            position: index + 1,
            source,
        };
        let change_set = entry.into_change_set(&path_str).map_err(invalid)?;
        change_log.add(change_set).map_err(invalid)?;
    }
    Ok(change_log)
}

impl ChangeSetEntry {
    fn into_change_set(self, path: &str) -> changeguard::Result<ChangeSet> {
        let mut builder = ChangeSet::builder(self.id, self.author, path)
            .contexts(self.contexts)
            .labels(self.labels)
            .dbms(self.dbms)
            .run_always(self.run_always)
            .run_on_change(self.run_on_change)
            .ignore(self.ignore)
            .statements(self.sql.into_statements());
        if let Some(description) = self.description {
            builder = builder.description(description);
        }
        if let Some(tag) = self.tag {
            builder = builder.tag(tag);
        }
        builder.build()
    }
}
