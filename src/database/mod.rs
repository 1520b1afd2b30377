//! Database collaborators
//!
//! [`Database`] owns the ledger of applied changesets and executes changesets.
//! [`LockService`] serializes runs against the same database; commands never
//! take the lock themselves, callers hold a [`LockGuard`] around them.

mod ledger_table;
mod lock;
mod memory;
mod postgres;

pub use ledger_table::{create_ledger_table, create_lock_table, validate_identifier};
pub use lock::PostgresLockService;
pub use memory::{InMemoryDatabase, InMemoryLockService};
pub use postgres::PostgresDatabase;

use crate::changelog::{ChangeSet, ExecType, RanChangeSet};
use crate::error::BoxError;
use crate::Result;

/// A target database and its ledger
pub trait Database {
    /// Short dialect name matched against changeset dbms sets, e.g. `postgresql`
    fn short_name(&self) -> &str;

    /// The ledger, in execution order
    fn ran_change_sets(&self) -> Result<Vec<RanChangeSet>>;

    /// Apply a changeset's statements
    ///
    /// Implementations should apply all statements or none of them.
    fn execute(&mut self, change_set: &ChangeSet) -> std::result::Result<(), BoxError>;

    /// Record a successful execution in the ledger, replacing any earlier row for
    /// the same changeset
    fn mark_ran(&mut self, change_set: &ChangeSet, exec_type: ExecType, deployment_id: &str) -> Result<RanChangeSet>;
}

/// Cross-run mutual exclusion
pub trait LockService {
    /// Block until the lock is held or the service gives up
    ///
    /// # Errors
    ///
    /// Returns [`crate::ChangeguardError::LockTimeout`] if the lock stays held elsewhere.
    fn acquire(&self) -> Result<()>;

    fn release(&self) -> Result<()>;

    fn is_locked(&self) -> Result<bool>;
}

/// Holds a [`LockService`] lock until dropped
///
/// ```
/// use changeguard::database::{InMemoryLockService, LockGuard, LockService};
///
/// let locks = InMemoryLockService::new();
/// {
///     let _guard = LockGuard::acquire(&locks)?;
///     assert!(locks.is_locked()?);
/// }
/// assert!(!locks.is_locked()?);
/// # Ok::<(), changeguard::ChangeguardError>(())
/// ```
pub struct LockGuard<'a> {
    service: &'a dyn LockService,
    released: bool,
}

impl<'a> LockGuard<'a> {
    pub fn acquire(service: &'a dyn LockService) -> Result<Self> {
        service.acquire()?;
        log::debug!("Changelog lock acquired");
        Ok(Self {
            service,
            released: false,
        })
    }

    /// Release now and report the outcome, instead of on drop
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.service.release()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.service.release() {
            log::warn!("Failed to release changelog lock: {e}");
        }
    }
}
