//! Checksum calculation for changesets
//!
//! The checksum is stored in the ledger when a changeset is applied and used to
//! detect changesets that were edited after deployment.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Version prefix of the current checksum algorithm
const CHECKSUM_VERSION: u8 = 1;

/// A versioned content checksum, rendered as `{version}:{sha256 hex}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckSum(String);

impl CheckSum {
    /// Calculate the checksum of a changeset's rendered statements and tag
    ///
    /// Statements are trimmed and line endings normalized so that whitespace-only
    /// edits to a changelog file do not register as drift.
    pub fn compute<S: AsRef<str>>(statements: &[S], tag: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        for statement in statements {
            let normalized = statement.as_ref().trim().replace("\r\n", "\n");
            hasher.update(normalized.as_bytes());
            hasher.update(b"\n");
        }
        if let Some(tag) = tag {
            hasher.update(b"tag:");
            hasher.update(tag.as_bytes());
        }
        let hash = hasher.finalize();

        CheckSum(format!("{}:{:x}", CHECKSUM_VERSION, hash))
    }

    /// Wrap a checksum read back from the ledger
    pub fn parse(value: impl Into<String>) -> Self {
        CheckSum(value.into())
    }

    /// The textual representation stored in the ledger
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Algorithm version encoded in the prefix, if any
    pub fn version(&self) -> Option<u8> {
        self.0.split_once(':').and_then(|(v, _)| v.parse().ok())
    }
}

impl fmt::Display for CheckSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_stable_across_whitespace() {
        let a = CheckSum::compute(&["CREATE TABLE users (id INT)"], None);
        let b = CheckSum::compute(&["  CREATE TABLE users (id INT)\r\n"], None);
        assert_eq!(a, b);
        assert_eq!(a.version(), Some(1));
    }

    #[test]
    fn test_checksum_changes_with_content_and_tag() {
        let base = CheckSum::compute(&["CREATE TABLE users (id INT)"], None);
        let edited = CheckSum::compute(&["CREATE TABLE users (id BIGINT)"], None);
        let tagged = CheckSum::compute(&["CREATE TABLE users (id INT)"], Some("v1"));
        assert_ne!(base, edited);
        assert_ne!(base, tagged);
    }

    #[test]
    fn test_parse_keeps_stored_value() {
        let stored = CheckSum::parse("1:abc");
        assert_eq!(stored.as_str(), "1:abc");
        assert_eq!(stored.to_string(), "1:abc");
    }
}
