use crate::changelog::{ChangeSet, ChangeSetId, ExecType, RanChangeSet};
use crate::database::{Database, LockService};
use crate::error::BoxError;
use crate::{ChangeguardError, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// A [`Database`] kept in memory
///
/// Executing a changeset records its statements instead of running them.
/// Failures can be injected per changeset id, and the whole database can be
/// made unreachable to exercise ledger errors.
#[derive(Debug, Clone)]
pub struct InMemoryDatabase {
    short_name: String,
    ledger: Vec<RanChangeSet>,
    executed: Vec<ChangeSetId>,
    statements: Vec<String>,
    fail_on: HashSet<String>,
    unreachable: bool,
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new("postgresql")
    }
}

impl InMemoryDatabase {
    pub fn new(short_name: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            ledger: Vec::new(),
            executed: Vec::new(),
            statements: Vec::new(),
            fail_on: HashSet::new(),
            unreachable: false,
        }
    }

    /// Start from an existing ledger
    pub fn with_ledger(mut self, ledger: Vec<RanChangeSet>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Make execution of the changeset with this id fail
    pub fn fail_on(mut self, change_set_id: impl Into<String>) -> Self {
        self.fail_on.insert(change_set_id.into());
        self
    }

    pub fn set_unreachable(&mut self, unreachable: bool) {
        self.unreachable = unreachable;
    }

    pub fn ledger(&self) -> &[RanChangeSet] {
        &self.ledger
    }

    /// Changesets executed so far, in order, including re-runs
    pub fn executed(&self) -> &[ChangeSetId] {
        &self.executed
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable {
            return Err(ChangeguardError::database("connection refused"));
        }
        Ok(())
    }

    fn next_order(&self) -> i32 {
        self.ledger.iter().map(|ran| ran.order_executed).max().unwrap_or(0) + 1
    }
}

impl Database for InMemoryDatabase {
    fn short_name(&self) -> &str {
        &self.short_name
    }

    fn ran_change_sets(&self) -> Result<Vec<RanChangeSet>> {
        self.check_reachable()?;
        Ok(self.ledger.clone())
    }

    fn execute(&mut self, change_set: &ChangeSet) -> std::result::Result<(), BoxError> {
        if self.unreachable {
            return Err("connection refused".into());
        }
        if self.fail_on.contains(change_set.id()) {
            return Err(format!("injected failure for changeset {}", change_set.id()).into());
        }
        self.statements.extend(change_set.statements().iter().cloned());
        self.executed.push(change_set.identity().clone());
        Ok(())
    }

    fn mark_ran(&mut self, change_set: &ChangeSet, exec_type: ExecType, deployment_id: &str) -> Result<RanChangeSet> {
        self.check_reachable()?;
        let ran = RanChangeSet::from_change_set(change_set, exec_type, self.next_order(), deployment_id, Utc::now());
        match self.ledger.iter_mut().find(|existing| existing.is_same_as(change_set)) {
            Some(existing) => *existing = ran.clone(),
            None => self.ledger.push(ran.clone()),
        }
        Ok(ran)
    }
}

/// A [`LockService`] for a single process
///
/// Acquisition fails immediately if the lock is already held.
#[derive(Debug, Default)]
pub struct InMemoryLockService {
    locked: AtomicBool,
}

impl InMemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockService for InMemoryLockService {
    fn acquire(&self) -> Result<()> {
        self.locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| ChangeguardError::LockTimeout("the changelog lock is held by another run".to_string()))
    }

    fn release(&self) -> Result<()> {
        self.locked.store(false, Ordering::Release);
        Ok(())
    }

    fn is_locked(&self) -> Result<bool> {
        Ok(self.locked.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::LockGuard;

    fn change_set(id: &str) -> ChangeSet {
        ChangeSet::builder(id, "alice", "changelog.toml")
            .statement(format!("CREATE TABLE t{id} (id INT)"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_execute_and_mark_ran() {
        let mut db = InMemoryDatabase::default();
        let cs = change_set("1");

        db.execute(&cs).unwrap();
        let ran = db.mark_ran(&cs, ExecType::Executed, "dep-1").unwrap();

        assert_eq!(ran.order_executed, 1);
        assert_eq!(db.ran_change_sets().unwrap(), vec![ran]);
        assert_eq!(db.statements(), ["CREATE TABLE t1 (id INT)"]);
    }

    #[test]
    fn test_rerun_replaces_ledger_row() {
        let mut db = InMemoryDatabase::default();
        let cs = change_set("1");
        db.mark_ran(&cs, ExecType::Executed, "dep-1").unwrap();
        db.mark_ran(&cs, ExecType::Reran, "dep-2").unwrap();

        assert_eq!(db.ledger().len(), 1);
        assert_eq!(db.ledger()[0].exec_type, ExecType::Reran);
        assert_eq!(db.ledger()[0].order_executed, 2);
        assert_eq!(db.ledger()[0].deployment_id.as_deref(), Some("dep-2"));
    }

    #[test]
    fn test_injected_failure() {
        let mut db = InMemoryDatabase::default().fail_on("2");
        assert!(db.execute(&change_set("1")).is_ok());
        let err = db.execute(&change_set("2")).unwrap_err();
        assert!(err.to_string().contains("injected failure"));
        assert_eq!(db.executed().len(), 1);
    }

    #[test]
    fn test_unreachable_database_fails_ledger_fetch() {
        let mut db = InMemoryDatabase::default();
        db.set_unreachable(true);
        assert!(matches!(db.ran_change_sets(), Err(ChangeguardError::Database(_))));
    }

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let locks = InMemoryLockService::new();
        {
            let _guard = LockGuard::acquire(&locks).unwrap();
            assert!(matches!(LockGuard::acquire(&locks), Err(ChangeguardError::LockTimeout(_))));
        }
        assert!(!locks.is_locked().unwrap());
        LockGuard::acquire(&locks).unwrap().release().unwrap();
    }
}
