//! Error types shared by the changelog model, the filter pipeline and the command layer

use crate::changelog::ChangeSetId;
use crate::command::ValidationFailure;

/// Boxed source error carried by database and execution failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by changeguard
///
/// Skip decisions are never errors: a changeset rejected by a filter is a
/// normal outcome recorded in the run summary.
#[derive(Debug, thiserror::Error)]
pub enum ChangeguardError {
    /// Invalid or missing operation argument, raised before any database access
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed context or label expression
    #[error("Invalid expression '{expression}': {reason}")]
    Expression { expression: String, reason: String },

    /// Two changesets in one changelog share an identity
    #[error("Duplicate changeset in changelog: {0}")]
    DuplicateChangeSet(ChangeSetId),

    /// Ledger fetch or ledger write failure
    #[error("Database error: {0}")]
    Database(#[source] BoxError),

    /// A changeset failed while being applied; traversal stopped at it
    #[error(
        "Changeset {change_set} failed ({applied_before} changeset(s) were applied earlier in this run): {source}"
    )]
    ExecutionFailed {
        change_set: ChangeSetId,
        applied_before: usize,
        #[source]
        source: BoxError,
    },

    /// Stored checksums disagree with the changelog
    #[error("Validation failed: {} changeset(s) were modified after being applied", .0.len())]
    ValidationFailed(Vec<ValidationFailure>),

    /// The lock service could not obtain the changelog lock
    #[error("Could not acquire changelog lock: {0}")]
    LockTimeout(String),
}

impl ChangeguardError {
    /// Build a [`ChangeguardError::Database`] from any displayable message
    pub fn database(message: impl Into<String>) -> Self {
        ChangeguardError::Database(message.into().into())
    }

    /// Whether the error was raised before any database access
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ChangeguardError::Configuration(_) | ChangeguardError::Expression { .. }
        )
    }
}

impl From<crate::executor::ExecutorError> for ChangeguardError {
    fn from(error: crate::executor::ExecutorError) -> Self {
        ChangeguardError::Database(Box::new(error))
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ChangeguardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_failed_display_references_change_set() {
        let err = ChangeguardError::ExecutionFailed {
            change_set: ChangeSetId::new("3", "alice", "db/changelog.toml"),
            applied_before: 2,
            source: "syntax error at or near \"TABEL\"".into(),
        };
        let display = err.to_string();
        assert!(display.contains("db/changelog.toml::3::alice"));
        assert!(display.contains("2 changeset(s)"));
        assert!(display.contains("TABEL"));
    }

    #[test]
    fn test_configuration_errors_are_classified() {
        assert!(ChangeguardError::Configuration("x".to_string()).is_configuration());
        assert!(!ChangeguardError::database("down").is_configuration());
        assert!(!ChangeguardError::LockTimeout("held".to_string()).is_configuration());
    }
}
