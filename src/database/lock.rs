//! Table-based changelog lock

use crate::database::ledger_table::{create_lock_table, table_exists, to_sql, validate_identifier};
use crate::database::LockService;
use crate::executor::SqlExecutor;
use crate::{ChangeguardError, Result};
use std::time::{Duration, Instant};

/// Id of the single lock row
const LOCK_ID: i32 = 1;

const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Per-attempt statement timeout, so a hanging insert cannot outlive the overall timeout
const STATEMENT_TIMEOUT_SECONDS: u64 = 5;

/// [`LockService`] backed by a lock table
///
/// The process that inserts the row with `id = 1` holds the lock; releasing
/// deletes it.
pub struct PostgresLockService<'a> {
    executor: &'a dyn SqlExecutor,
    table: String,
    timeout: Duration,
    owner: String,
}

impl<'a> PostgresLockService<'a> {
    /// # Errors
    ///
    /// Returns a configuration error if `table` is not a plain identifier.
    pub fn new(executor: &'a dyn SqlExecutor, table: impl Into<String>, timeout_seconds: u64) -> Result<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self {
            executor,
            table,
            timeout: Duration::from_secs(timeout_seconds),
            owner: format!("pid-{}", std::process::id()),
        })
    }

    /// Create the lock table if it does not exist yet
    pub fn initialize(&self) -> Result<()> {
        let sql = to_sql(&create_lock_table(&self.table));
        self.executor.execute(&sql, &[])?;
        Ok(())
    }

    fn timeout_error(&self) -> ChangeguardError {
        ChangeguardError::LockTimeout(format!(
            "Failed to acquire the changelog lock within {} seconds. \
             Another process may be running an update. \
             If this persists, check for stuck processes or manually delete \
             the lock row: DELETE FROM {} WHERE id = {LOCK_ID}",
            self.timeout.as_secs(),
            self.table
        ))
    }

    fn try_insert(&self) -> Result<u64> {
        let sql = format!(
            r#"INSERT INTO "{}" (id, locked_by, lock_granted) VALUES ($1, $2, NOW()) ON CONFLICT (id) DO NOTHING"#,
            self.table
        );
        Ok(self.executor.execute(&sql, &[&LOCK_ID, &self.owner])?)
    }

    fn reset_statement_timeout(&self) {
        let _ = self.executor.execute("RESET statement_timeout", &[]);
    }
}

impl LockService for PostgresLockService<'_> {
    fn acquire(&self) -> Result<()> {
        let start = Instant::now();
        let _ = self.executor.execute(
            &format!("SET statement_timeout = '{STATEMENT_TIMEOUT_SECONDS}s'"),
            &[],
        );

        loop {
            if start.elapsed() >= self.timeout {
                self.reset_statement_timeout();
                return Err(self.timeout_error());
            }

            match self.try_insert() {
                Ok(rows) if rows > 0 => {
                    self.reset_statement_timeout();
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => {
                    let message = e.to_string();
                    if !(message.contains("timeout") || message.contains("canceling statement")) {
                        self.reset_statement_timeout();
                        return Err(e);
                    }
                }
            }

            std::thread::sleep(RETRY_INTERVAL);
        }
    }

    fn release(&self) -> Result<()> {
        let sql = format!(r#"DELETE FROM "{}" WHERE id = $1"#, self.table);
        self.executor.execute(&sql, &[&LOCK_ID])?;
        Ok(())
    }

    fn is_locked(&self) -> Result<bool> {
        if !table_exists(self.executor, &self.table)? {
            return Ok(false);
        }
        let sql = format!(r#"SELECT COUNT(*) FROM "{}" WHERE id = $1"#, self.table);
        let row = self.executor.query_one(&sql, &[&LOCK_ID])?;
        let count: i64 = row.get(0);
        Ok(count > 0)
    }
}
