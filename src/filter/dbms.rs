use crate::changelog::ChangeSet;
use crate::filter::{FilterKind, FilterResult};

/// Rejects changesets whose dbms list does not admit the target database
#[derive(Debug, Clone)]
pub struct DbmsChangeSetFilter {
    short_name: String,
}

impl DbmsChangeSetFilter {
    /// `short_name` is the target database's identifier, e.g. `postgresql`
    pub fn new(short_name: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
        }
    }

    pub fn accepts(&self, change_set: &ChangeSet) -> FilterResult {
        let dbms = change_set.dbms();
        if dbms.is_empty() {
            return FilterResult::accept(FilterKind::Dbms, "Changeset applies to all databases");
        }

        if dbms.admits(&self.short_name) {
            FilterResult::accept(
                FilterKind::Dbms,
                format!("Database '{}' matches '{}'", self.short_name, dbms),
            )
        } else {
            FilterResult::reject(
                FilterKind::Dbms,
                format!("Database '{}' does not match '{}'", self.short_name, dbms),
            )
        }
    }
}
