//! # changeguard
//!
//! Changelog-driven schema migrations for PostgreSQL over `may_postgres`.
//!
//! A [`ChangeLog`] is an ordered list of changesets. Every run walks it through
//! a chain of filters that decide, with a recorded reason, which changesets to
//! apply: already-applied ones, context and label mismatches, other dialects,
//! ignored changesets and anything past the operation's bound (a count or a
//! tag). The same chain drives both [`command::update`], which applies
//! changesets and records them in the ledger, and [`command::status`], which
//! only reports.

pub mod changelog;
pub mod command;
pub mod config;
pub mod connection;
pub mod database;
pub mod error;
pub mod executor;
pub mod filter;
pub mod iterator;
pub mod mdc;
pub mod metrics;

pub use changelog::{ChangeLog, ChangeSet, ChangeSetId, RanChangeSet};
pub use command::{
    CommandStep, UpdateArguments, UpdateCommandStep, UpdateCountCommandStep, UpdateReport, UpdateSummary,
    UpdateToTagCommandStep,
};
pub use config::ChangeguardConfig;
pub use database::{Database, LockGuard, LockService};
pub use error::{ChangeguardError, Result};
pub use executor::{MayPostgresExecutor, SqlExecutor};
pub use filter::{ChangeSetFilter, FilterKind, FilterResult};
pub use iterator::{ChangeLogIterator, ChangeSetVisitor, RunSummary, StatusChangeLogIterator, StatusReport};
