//! Changelog data model
//!
//! This module provides the inputs of every run:
//! - [`ChangeSet`] and [`ChangeLog`], the ordered, immutable sequence of changes
//! - [`RanChangeSet`], a row of the ledger of already-applied changesets
//! - context/label [`Expression`]s and [`DbmsSet`]s deciding applicability
//! - [`CheckSum`] for drift detection
//!
//! # Example
//!
//! ```rust
//! use changeguard::changelog::{ChangeLog, ChangeSet};
//!
//! let change_log = ChangeLog::from_change_sets(
//!     "db/changelog.toml",
//!     vec![
//!         ChangeSet::builder("1", "alice", "db/changelog.toml")
//!             .statement("CREATE TABLE users (id BIGINT PRIMARY KEY)")
//!             .build()?,
//!         ChangeSet::builder("2", "alice", "db/changelog.toml")
//!             .tag("v1.0")
//!             .build()?,
//!     ],
//! )?;
//! assert_eq!(change_log.len(), 2);
//! # Ok::<(), changeguard::ChangeguardError>(())
//! ```

pub mod change_set;
pub mod checksum;
pub mod dbms;
pub mod expression;
pub mod ran_change_set;

pub use change_set::{ChangeLog, ChangeSet, ChangeSetBuilder, ChangeSetId};
pub use checksum::CheckSum;
pub use dbms::DbmsSet;
pub use expression::{ContextExpression, Contexts, Expression, LabelExpression, Labels, NameSet};
pub use ran_change_set::{ExecType, RanChangeSet};
