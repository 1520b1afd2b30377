//! DDL for the ledger and lock tables

use crate::executor::SqlExecutor;
use crate::{ChangeguardError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use sea_query::{Alias, ColumnDef, Index, PostgresQueryBuilder, Table, TableCreateStatement};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern is a valid regex"));

/// Reject table names that cannot be used unquoted in SQL
///
/// Table names are interpolated into statements, so only plain identifiers are
/// allowed.
pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(ChangeguardError::Configuration(format!(
            "'{name}' is not a valid table name"
        )))
    }
}

/// The ledger table: one row per applied changeset, keyed by identity
pub fn create_ledger_table(table: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(table))
        .if_not_exists()
        .col(ColumnDef::new(Alias::new("id")).string_len(255).not_null())
        .col(ColumnDef::new(Alias::new("author")).string_len(255).not_null())
        .col(ColumnDef::new(Alias::new("filename")).string_len(255).not_null())
        .col(ColumnDef::new(Alias::new("date_executed")).timestamp_with_time_zone().not_null())
        .col(ColumnDef::new(Alias::new("order_executed")).integer().not_null())
        .col(ColumnDef::new(Alias::new("exec_type")).string_len(10).not_null())
        .col(ColumnDef::new(Alias::new("checksum")).string_len(80).null())
        .col(ColumnDef::new(Alias::new("description")).string_len(255).null())
        .col(ColumnDef::new(Alias::new("tag")).string_len(255).null())
        .col(ColumnDef::new(Alias::new("deployment_id")).string_len(64).null())
        .col(ColumnDef::new(Alias::new("contexts")).string_len(255).null())
        .col(ColumnDef::new(Alias::new("labels")).string_len(255).null())
        .primary_key(
            Index::create()
                .col(Alias::new("id"))
                .col(Alias::new("author"))
                .col(Alias::new("filename")),
        )
        .to_owned()
}

/// The lock table: a row with `id = 1` means the lock is held
pub fn create_lock_table(table: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(table))
        .if_not_exists()
        .col(ColumnDef::new(Alias::new("id")).integer().not_null().primary_key())
        .col(ColumnDef::new(Alias::new("locked_by")).string_len(255).not_null())
        .col(ColumnDef::new(Alias::new("lock_granted")).timestamp_with_time_zone().not_null())
        .to_owned()
}

/// Whether `table` exists, checked without touching it
///
/// Read-only commands use this so that they never create the ledger or lock.
pub(crate) fn table_exists(executor: &dyn SqlExecutor, table: &str) -> Result<bool> {
    let quoted = format!(r#""{table}""#);
    let rows = executor.query_all("SELECT 1 WHERE to_regclass($1::text) IS NOT NULL", &[&quoted])?;
    Ok(!rows.is_empty())
}

pub(crate) fn to_sql(statement: &TableCreateStatement) -> String {
    statement.build(PostgresQueryBuilder)
}
