//! Database applicability lists (`dbms = "postgresql, !mysql"`)

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

const ALL: &str = "all";
const NONE: &str = "none";

/// Set of database short names a changeset applies to
///
/// An empty set applies to every database. Entries may be negated with `!`,
/// and the keywords `all` and `none` are recognized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbmsSet {
    entries: BTreeSet<String>,
}

impl DbmsSet {
    /// Parse a comma separated list of short names
    pub fn parse(value: &str) -> Self {
        value.split(',').collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a database with the given short name is admitted
    pub fn admits(&self, short_name: &str) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        let short_name = short_name.trim().to_lowercase();

        if self.entries.contains(NONE) {
            return false;
        }
        if self.entries.contains(&format!("!{short_name}")) {
            return false;
        }
        if self.entries.contains(ALL) || self.entries.contains(&short_name) {
            return true;
        }

        // Only negations listed, and none of them excluded this database
        self.entries.iter().all(|entry| entry.starts_with('!'))
    }
}

impl<S: AsRef<str>> FromIterator<S> for DbmsSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|entry| entry.as_ref().trim().to_lowercase())
            .filter(|entry| !entry.is_empty())
            .collect();
        Self { entries }
    }
}

impl fmt::Display for DbmsSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.entries.iter().map(String::as_str).collect();
        f.write_str(&joined.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "postgresql", true)]
    #[case("postgresql", "postgresql", true)]
    #[case("PostgreSQL, h2", "h2", true)]
    #[case("mysql", "postgresql", false)]
    #[case("!mysql", "postgresql", true)]
    #[case("!postgresql", "postgresql", false)]
    #[case("all", "oracle", true)]
    #[case("all, !oracle", "oracle", false)]
    #[case("none", "postgresql", false)]
    fn test_admits(#[case] dbms: &str, #[case] target: &str, #[case] expected: bool) {
        assert_eq!(DbmsSet::parse(dbms).admits(target), expected, "{dbms} vs {target}");
    }
}
