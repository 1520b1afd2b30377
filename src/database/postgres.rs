//! PostgreSQL-backed ledger

use crate::changelog::{ChangeSet, ChangeSetId, CheckSum, ExecType, RanChangeSet};
use crate::database::ledger_table::{create_ledger_table, table_exists, to_sql, validate_identifier};
use crate::database::Database;
use crate::error::BoxError;
use crate::executor::{in_transaction, parse_timestamp, ExecutorError, SqlExecutor};
use crate::Result;
use chrono::Utc;

const SHORT_NAME: &str = "postgresql";

/// [`Database`] over a [`SqlExecutor`]
///
/// Each changeset runs in its own transaction. The ledger row is written
/// afterwards, so a crash between the two leaves the changeset applied but
/// unrecorded.
pub struct PostgresDatabase<'a> {
    executor: &'a dyn SqlExecutor,
    ledger_table: String,
}

impl<'a> PostgresDatabase<'a> {
    /// # Errors
    ///
    /// Returns a configuration error if `ledger_table` is not a plain identifier.
    pub fn new(executor: &'a dyn SqlExecutor, ledger_table: impl Into<String>) -> Result<Self> {
        let ledger_table = ledger_table.into();
        validate_identifier(&ledger_table)?;
        Ok(Self { executor, ledger_table })
    }

    pub fn ledger_table(&self) -> &str {
        &self.ledger_table
    }

    /// Create the ledger table if it does not exist yet
    pub fn initialize(&self) -> Result<()> {
        let sql = to_sql(&create_ledger_table(&self.ledger_table));
        self.executor.execute(&sql, &[])?;
        Ok(())
    }

    /// Whether the ledger table has been created
    pub fn ledger_exists(&self) -> Result<bool> {
        table_exists(self.executor, &self.ledger_table)
    }

    fn next_order(&self) -> Result<i32> {
        let sql = format!(
            r#"SELECT COALESCE(MAX(order_executed), 0) + 1 FROM "{}""#,
            self.ledger_table
        );
        let row = self.executor.query_one(&sql, &[])?;
        Ok(row.get(0))
    }
}

impl Database for PostgresDatabase<'_> {
    fn short_name(&self) -> &str {
        SHORT_NAME
    }

    fn ran_change_sets(&self) -> Result<Vec<RanChangeSet>> {
        // a database that was never updated has an empty ledger
        if !self.ledger_exists()? {
            return Ok(Vec::new());
        }
        let sql = format!(
            r#"
            SELECT id, author, filename,
                   to_char(date_executed AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS.US'),
                   order_executed, exec_type, checksum, description, tag,
                   deployment_id, contexts, labels
            FROM "{}"
            ORDER BY order_executed, date_executed
            "#,
            self.ledger_table
        );
        let rows = self.executor.query_all(&sql, &[])?;
        rows.iter().map(ran_change_set_from_row).collect()
    }

    fn execute(&mut self, change_set: &ChangeSet) -> std::result::Result<(), BoxError> {
        in_transaction(self.executor, |tx| {
            for statement in change_set.statements() {
                tx.execute(statement, &[])?;
            }
            Ok::<_, ExecutorError>(())
        })
        .map_err(BoxError::from)
    }

    fn mark_ran(&mut self, change_set: &ChangeSet, exec_type: ExecType, deployment_id: &str) -> Result<RanChangeSet> {
        let order = self.next_order()?;
        let ran = RanChangeSet::from_change_set(change_set, exec_type, order, deployment_id, Utc::now());

        let sql = format!(
            r#"
            INSERT INTO "{}" (id, author, filename, date_executed, order_executed, exec_type,
                              checksum, description, tag, deployment_id, contexts, labels)
            VALUES ($1, $2, $3, NOW(), $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id, author, filename) DO UPDATE SET
                date_executed = EXCLUDED.date_executed,
                order_executed = EXCLUDED.order_executed,
                exec_type = EXCLUDED.exec_type,
                checksum = EXCLUDED.checksum,
                description = EXCLUDED.description,
                tag = EXCLUDED.tag,
                deployment_id = EXCLUDED.deployment_id,
                contexts = EXCLUDED.contexts,
                labels = EXCLUDED.labels
            "#,
            self.ledger_table
        );
        let exec_type_name = ran.exec_type.as_str().to_string();
        let checksum = ran.checksum.as_ref().map(|c| c.as_str().to_string());
        self.executor.execute(
            &sql,
            &[
                &ran.identity.id,
                &ran.identity.author,
                &ran.identity.path,
                &ran.order_executed,
                &exec_type_name,
                &checksum,
                &ran.description,
                &ran.tag,
                &ran.deployment_id,
                &ran.contexts,
                &ran.labels,
            ],
        )?;

        Ok(ran)
    }
}

fn ran_change_set_from_row(row: &may_postgres::Row) -> Result<RanChangeSet> {
    let id: String = row.get(0);
    let author: String = row.get(1);
    let filename: String = row.get(2);
    let date_executed: String = row.get(3);
    let exec_type: String = row.get(5);
    let checksum: Option<String> = row.get(6);

    Ok(RanChangeSet {
        identity: ChangeSetId::new(id, author, filename),
        checksum: checksum.filter(|c| !c.is_empty()).map(CheckSum::parse),
        date_executed: parse_timestamp(&date_executed)?,
        order_executed: row.get(4),
        exec_type: exec_type.parse()?,
        description: row.get(7),
        tag: row.get(8),
        deployment_id: row.get(9),
        contexts: row.get(10),
        labels: row.get(11),
    })
}
