//! `ChangeSet` and `ChangeLog` - the ordered, immutable input of every run

use crate::changelog::{CheckSum, ContextExpression, DbmsSet, Expression, Labels, NameSet};
use crate::error::{ChangeguardError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a changeset: `(id, author, path)`, unique within a changelog
///
/// The path is normalized on construction (`\` becomes `/`, leading `./` and
/// `classpath:` are dropped) so ledger rows written from another working
/// directory or platform still match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangeSetId {
    pub id: String,
    pub author: String,
    pub path: String,
}

impl ChangeSetId {
    pub fn new(id: impl Into<String>, author: impl Into<String>, path: impl AsRef<str>) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            path: normalize_path(path.as_ref()),
        }
    }
}

impl fmt::Display for ChangeSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.path, self.id, self.author)
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let path = path.strip_prefix("classpath:").unwrap_or(&path);
    let mut path = path;
    while let Some(stripped) = path.strip_prefix("./") {
        path = stripped;
    }
    path.trim_start_matches('/').to_string()
}

/// One atomic, identified database change with its applicability metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    identity: ChangeSetId,
    position: usize,
    description: Option<String>,
    contexts: ContextExpression,
    labels: Labels,
    dbms: DbmsSet,
    run_always: bool,
    run_on_change: bool,
    ignore: bool,
    statements: Vec<String>,
    tag: Option<String>,
    checksum: CheckSum,
}

impl ChangeSet {
    /// Start building a changeset with the given identity
    pub fn builder(
        id: impl Into<String>,
        author: impl Into<String>,
        path: impl AsRef<str>,
    ) -> ChangeSetBuilder {
        ChangeSetBuilder::new(ChangeSetId::new(id, author, path))
    }

    pub fn identity(&self) -> &ChangeSetId {
        &self.identity
    }

    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn author(&self) -> &str {
        &self.identity.author
    }

    pub fn path(&self) -> &str {
        &self.identity.path
    }

    /// Zero-based position in the owning changelog
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn contexts(&self) -> &ContextExpression {
        &self.contexts
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn dbms(&self) -> &DbmsSet {
        &self.dbms
    }

    /// Re-applied on every run even if already in the ledger
    pub fn is_run_always(&self) -> bool {
        self.run_always
    }

    /// Re-applied when its checksum differs from the ledger's
    pub fn is_run_on_change(&self) -> bool {
        self.run_on_change
    }

    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    /// Rendered SQL statements, executed in order
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Name of the marker this changeset establishes, if it is a tag changeset
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn checksum(&self) -> &CheckSum {
        &self.checksum
    }
}

/// Builder for [`ChangeSet`]
#[derive(Debug, Clone)]
pub struct ChangeSetBuilder {
    identity: ChangeSetId,
    description: Option<String>,
    contexts: String,
    labels: String,
    dbms: String,
    run_always: bool,
    run_on_change: bool,
    ignore: bool,
    statements: Vec<String>,
    tag: Option<String>,
}

impl ChangeSetBuilder {
    fn new(identity: ChangeSetId) -> Self {
        Self {
            identity,
            description: None,
            contexts: String::new(),
            labels: String::new(),
            dbms: String::new(),
            run_always: false,
            run_on_change: false,
            ignore: false,
            statements: Vec::new(),
            tag: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Context expression, e.g. `"dev and !load-test"`
    pub fn contexts(mut self, contexts: impl Into<String>) -> Self {
        self.contexts = contexts.into();
        self
    }

    /// Comma separated label list
    pub fn labels(mut self, labels: impl Into<String>) -> Self {
        self.labels = labels.into();
        self
    }

    /// Comma separated dbms list
    pub fn dbms(mut self, dbms: impl Into<String>) -> Self {
        self.dbms = dbms.into();
        self
    }

    pub fn run_always(mut self, run_always: bool) -> Self {
        self.run_always = run_always;
        self
    }

    pub fn run_on_change(mut self, run_on_change: bool) -> Self {
        self.run_on_change = run_on_change;
        self
    }

    pub fn ignore(mut self, ignore: bool) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn statement(mut self, sql: impl Into<String>) -> Self {
        self.statements.push(sql.into());
        self
    }

    pub fn statements<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statements.extend(statements.into_iter().map(Into::into));
        self
    }

    /// Mark this changeset as establishing the named tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Parse the expressions and compute the checksum
    ///
    /// # Errors
    ///
    /// Returns [`ChangeguardError::Expression`] if the context expression is malformed.
    pub fn build(self) -> Result<ChangeSet> {
        let contexts = Expression::parse(&self.contexts)?;
        let checksum = CheckSum::compute(&self.statements, self.tag.as_deref());

        Ok(ChangeSet {
            identity: self.identity,
            position: 0,
            description: self.description,
            contexts,
            labels: NameSet::parse(&self.labels),
            dbms: DbmsSet::parse(&self.dbms),
            run_always: self.run_always,
            run_on_change: self.run_on_change,
            ignore: self.ignore,
            statements: self.statements,
            tag: self.tag,
            checksum,
        })
    }
}

/// The ordered sequence of changesets; insertion order is the apply order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLog {
    path: String,
    change_sets: Vec<ChangeSet>,
}

impl ChangeLog {
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            change_sets: Vec::new(),
        }
    }

    /// Build a changelog from changesets in apply order
    ///
    /// # Errors
    ///
    /// Returns [`ChangeguardError::DuplicateChangeSet`] if two changesets share an identity.
    pub fn from_change_sets(
        path: impl AsRef<str>,
        change_sets: impl IntoIterator<Item = ChangeSet>,
    ) -> Result<Self> {
        let mut change_log = Self::new(path);
        for change_set in change_sets {
            change_log.add(change_set)?;
        }
        Ok(change_log)
    }

    /// Append a changeset at the end of the changelog
    ///
    /// # Errors
    ///
    /// Returns [`ChangeguardError::DuplicateChangeSet`] if the identity is already present.
    pub fn add(&mut self, mut change_set: ChangeSet) -> Result<()> {
        if self.get(change_set.identity()).is_some() {
            return Err(ChangeguardError::DuplicateChangeSet(change_set.identity.clone()));
        }
        change_set.position = self.change_sets.len();
        self.change_sets.push(change_set);
        Ok(())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn change_sets(&self) -> &[ChangeSet] {
        &self.change_sets
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChangeSet> {
        self.change_sets.iter()
    }

    pub fn len(&self) -> usize {
        self.change_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.change_sets.is_empty()
    }

    pub fn get(&self, identity: &ChangeSetId) -> Option<&ChangeSet> {
        self.change_sets.iter().find(|cs| cs.identity() == identity)
    }
}

impl<'a> IntoIterator for &'a ChangeLog {
    type Item = &'a ChangeSet;
    type IntoIter = std::slice::Iter<'a, ChangeSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_path_is_normalized() {
        let a = ChangeSetId::new("1", "alice", "./db\\changelog.toml");
        let b = ChangeSetId::new("1", "alice", "classpath:db/changelog.toml");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "db/changelog.toml::1::alice");
    }

    #[test]
    fn test_builder_parses_metadata() {
        let cs = ChangeSet::builder("1", "alice", "db/changelog.toml")
            .contexts("dev and !test")
            .labels("core, Billing")
            .dbms("postgresql")
            .statement("CREATE TABLE users (id INT)")
            .tag("v1.0")
            .build()
            .unwrap();

        assert!(!cs.contexts().is_empty());
        assert!(cs.labels().contains("billing"));
        assert!(cs.dbms().admits("postgresql"));
        assert_eq!(cs.tag(), Some("v1.0"));
        assert_eq!(cs.statements().len(), 1);
    }

    #[test]
    fn test_builder_rejects_malformed_contexts() {
        let result = ChangeSet::builder("1", "alice", "db/changelog.toml")
            .contexts("dev and")
            .build();
        assert!(matches!(result, Err(ChangeguardError::Expression { .. })));
    }

    #[test]
    fn test_change_log_assigns_positions_and_rejects_duplicates() {
        let mut change_log = ChangeLog::new("db/changelog.toml");
        for id in ["a", "b"] {
            let cs = ChangeSet::builder(id, "alice", "db/changelog.toml").build().unwrap();
            change_log.add(cs).unwrap();
        }
        assert_eq!(change_log.change_sets()[1].position(), 1);

        let dup = ChangeSet::builder("a", "alice", "db/changelog.toml").build().unwrap();
        let err = change_log.add(dup).unwrap_err();
        assert!(matches!(err, ChangeguardError::DuplicateChangeSet(_)));
        assert_eq!(change_log.len(), 2);
    }
}
