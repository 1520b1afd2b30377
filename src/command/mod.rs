//! Command steps
//!
//! A [`CommandStep`] describes one operation (`update`, `update-count`,
//! `update-to-tag`): its names, its audit metadata and the filter that bounds
//! the run. [`update`] and [`status`] share everything else: argument
//! validation, ledger fetch, checksum validation and the filter chain, which is
//! always built in the order should-run, context, label, dbms, ignore, bound.
//! Both take the same inputs, so a status report predicts exactly what an
//! update would apply.
//!
//! ```
//! use changeguard::changelog::{ChangeLog, ChangeSet};
//! use changeguard::command::{self, UpdateArguments, UpdateToTagCommandStep};
//! use changeguard::database::InMemoryDatabase;
//!
//! let change_log = ChangeLog::from_change_sets(
//!     "changelog.toml",
//!     vec![
//!         ChangeSet::builder("1", "alice", "changelog.toml").statement("CREATE TABLE a (id INT)").build()?,
//!         ChangeSet::builder("2", "alice", "changelog.toml").tag("v1").build()?,
//!         ChangeSet::builder("3", "alice", "changelog.toml").statement("CREATE TABLE b (id INT)").build()?,
//!     ],
//! )?;
//! let step = UpdateToTagCommandStep::new("v1")?;
//! let mut db = InMemoryDatabase::default();
//!
//! let report = command::update(&step, &mut db, &change_log, &UpdateArguments::default())?;
//! assert_eq!(report.applied().len(), 2);
//! # Ok::<(), changeguard::ChangeguardError>(())
//! ```

mod summary;
mod update;
mod update_count;
mod update_to_tag;
mod validate;

pub use summary::{FilteredChangeSet, UpdateSummary, UpdateSummaryReport};
pub use update::UpdateCommandStep;
pub use update_count::UpdateCountCommandStep;
pub use update_to_tag::UpdateToTagCommandStep;
pub use validate::{ensure_valid, validate_checksums, ValidationFailure};

use crate::changelog::{ChangeLog, ChangeSet, ChangeSetId, Contexts, ExecType, LabelExpression, RanChangeSet};
use crate::database::Database;
use crate::filter::{
    ChangeSetFilter, ContextChangeSetFilter, DbmsChangeSetFilter, FilterResult, IgnoreChangeSetFilter,
    LabelChangeSetFilter, ShouldRunChangeSetFilter,
};
use crate::iterator::{describe_rejections, ChangeLogIterator, ChangeSetVisitor, RunSummary, StatusChangeLogIterator, StatusReport};
use crate::mdc::{AuditMetadata, MdcKey};
use crate::{ChangeguardError, Result};
use std::collections::HashSet;
use std::time::Instant;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Runtime arguments shared by every update operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateArguments {
    pub contexts: Contexts,
    pub labels: LabelExpression,
    pub show_summary: UpdateSummary,
}

impl UpdateArguments {
    /// Validate raw argument values
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown summary verbosity or a
    /// malformed label expression.
    pub fn parse(contexts: Option<&str>, labels: Option<&str>, show_summary: Option<&str>) -> Result<Self> {
        Ok(Self {
            contexts: Contexts::parse(contexts.unwrap_or_default()),
            labels: LabelExpression::parse(labels.unwrap_or_default())?,
            show_summary: show_summary.map(str::parse::<UpdateSummary>).transpose()?.unwrap_or_default(),
        })
    }
}

/// One update operation
pub trait CommandStep {
    /// Name recorded as the `commandName` audit value, e.g. `updateToTag`
    fn command_name(&self) -> &'static str;

    /// Name recorded as the `operation` audit value, e.g. `update-to-tag`
    fn operation(&self) -> &'static str;

    /// The filter that ends the run early, if the operation has one
    fn bound_filter(&self, ran_change_sets: &[RanChangeSet]) -> Option<ChangeSetFilter>;

    fn target_tag(&self) -> Option<&str> {
        None
    }

    /// Add the operation's own audit values
    fn custom_mdc(&self, metadata: &mut AuditMetadata) {
        let _ = metadata;
    }

    /// The full filter chain for one run
    fn filters(&self, short_name: &str, ran_change_sets: &[RanChangeSet], arguments: &UpdateArguments) -> Vec<ChangeSetFilter> {
        let mut filters: Vec<ChangeSetFilter> = vec![
            ShouldRunChangeSetFilter::new(ran_change_sets).into(),
            ContextChangeSetFilter::new(arguments.contexts.clone()).into(),
            LabelChangeSetFilter::new(arguments.labels.clone()).into(),
            DbmsChangeSetFilter::new(short_name).into(),
            IgnoreChangeSetFilter::new().into(),
        ];
        filters.extend(self.bound_filter(ran_change_sets));
        filters
    }

    fn audit_metadata(&self, deployment_id: &str, short_name: &str, change_log: &ChangeLog) -> AuditMetadata {
        let mut metadata = AuditMetadata::new();
        metadata.add(MdcKey::COMMAND_NAME, self.command_name());
        metadata.add(MdcKey::OPERATION, self.operation());
        metadata.add(MdcKey::DEPLOYMENT_ID, deployment_id);
        metadata.add(MdcKey::DATABASE, short_name);
        metadata.add(MdcKey::CHANGELOG_FILE, change_log.path());
        self.custom_mdc(&mut metadata);
        metadata
    }
}

/// Outcome of a successful update
#[derive(Debug, Clone)]
pub struct UpdateReport {
    deployment_id: String,
    summary: RunSummary,
    applied: Vec<RanChangeSet>,
    metadata: AuditMetadata,
    show_summary: UpdateSummary,
}

impl UpdateReport {
    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Ledger rows written by this run, in execution order
    pub fn applied(&self) -> &[RanChangeSet] {
        &self.applied
    }

    pub fn applied_ids(&self) -> impl Iterator<Item = &ChangeSetId> {
        self.applied.iter().map(|ran| &ran.identity)
    }

    pub fn metadata(&self) -> &AuditMetadata {
        &self.metadata
    }

    pub fn update_summary(&self) -> UpdateSummaryReport {
        UpdateSummaryReport::from_run_summary(&self.summary)
    }

    /// The summary at the configured verbosity
    pub fn render_summary(&self) -> Option<String> {
        self.update_summary().render(self.show_summary)
    }
}

/// Identifier shared by every ledger row written in one run
pub fn generate_deployment_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..10].to_string()
}

/// Apply every changeset the chain accepts and record it in the ledger
///
/// Stops at the first changeset that fails; changesets applied before it stay
/// applied and recorded.
///
/// # Errors
///
/// - [`ChangeguardError::Database`] if the ledger cannot be read or written
/// - [`ChangeguardError::ValidationFailed`] if an applied changeset was modified
/// - [`ChangeguardError::ExecutionFailed`] if a changeset fails
pub fn update<D>(step: &dyn CommandStep, database: &mut D, change_log: &ChangeLog, arguments: &UpdateArguments) -> Result<UpdateReport>
where
    D: Database + ?Sized,
{
    let deployment_id = generate_deployment_id();
    let mut metadata = step.audit_metadata(&deployment_id, database.short_name(), change_log);

    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::command_span(&metadata).entered();

    log::info!("Starting {} [{metadata}]", step.operation());

    let outcome = run_update(step, database, change_log, arguments, &deployment_id);

    #[cfg(feature = "metrics")]
    METRICS.record_command(step.operation(), if outcome.is_ok() { "success" } else { "failed" });

    match outcome {
        Ok((summary, applied)) => {
            metadata.add(MdcKey::UPDATE_OUTCOME, "success");
            metadata.add(MdcKey::CHANGESETS_APPLIED, applied.len().to_string());
            metadata.add(MdcKey::CHANGESETS_SKIPPED, summary.rejected_count().to_string());
            log::info!(
                "{} finished: {} changeset(s) applied, {} skipped [{metadata}]",
                step.operation(),
                applied.len(),
                summary.rejected_count()
            );

            Ok(UpdateReport {
                deployment_id,
                summary,
                applied,
                metadata,
                show_summary: arguments.show_summary,
            })
        }
        Err(e) => {
            metadata.add(MdcKey::UPDATE_OUTCOME, "failed");
            log::error!("{} failed: {e} [{metadata}]", step.operation());
            Err(e)
        }
    }
}

fn run_update<D>(
    step: &dyn CommandStep,
    database: &mut D,
    change_log: &ChangeLog,
    arguments: &UpdateArguments,
    deployment_id: &str,
) -> Result<(RunSummary, Vec<RanChangeSet>)>
where
    D: Database + ?Sized,
{
    let ran_change_sets = database.ran_change_sets()?;
    ensure_valid(change_log, &ran_change_sets)?;

    let filters = step.filters(database.short_name(), &ran_change_sets, arguments);
    let mut visitor = UpdateVisitor {
        database,
        deployment_id,
        previously_ran: ran_change_sets.iter().map(|ran| ran.identity.clone()).collect(),
        applied: Vec::new(),
    };

    let summary = ChangeLogIterator::new(change_log, filters).run(&mut visitor)?;
    Ok((summary, visitor.applied))
}

/// Report what [`update`] would do with the same inputs, without changing anything
///
/// # Errors
///
/// - [`ChangeguardError::Database`] if the ledger cannot be read
/// - [`ChangeguardError::ValidationFailed`] if an applied changeset was modified
pub fn status<D>(step: &dyn CommandStep, database: &D, change_log: &ChangeLog, arguments: &UpdateArguments) -> Result<StatusReport>
where
    D: Database + ?Sized,
{
    let metadata = step.audit_metadata(&generate_deployment_id(), database.short_name(), change_log);

    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::command_span(&metadata).entered();

    log::info!("Computing status for {} [{metadata}]", step.operation());

    let ran_change_sets = database.ran_change_sets()?;
    ensure_valid(change_log, &ran_change_sets)?;

    let filters = step.filters(database.short_name(), &ran_change_sets, arguments);
    let report = StatusChangeLogIterator::new(
        change_log,
        step.target_tag().map(str::to_string),
        &ran_change_sets,
        filters,
    )
    .run()
    .with_show_summary(arguments.show_summary);

    log::info!(
        "{} would apply {} changeset(s) [{metadata}]",
        step.operation(),
        report.would_apply_count()
    );
    Ok(report)
}

/// Executes accepted changesets and appends them to the ledger
struct UpdateVisitor<'a, D: Database + ?Sized> {
    database: &'a mut D,
    deployment_id: &'a str,
    previously_ran: HashSet<ChangeSetId>,
    applied: Vec<RanChangeSet>,
}

impl<D: Database + ?Sized> ChangeSetVisitor for UpdateVisitor<'_, D> {
    type Error = ChangeguardError;

    fn visit(&mut self, change_set: &ChangeSet, _results: &[FilterResult]) -> Result<()> {
        log::info!("Running changeset {}", change_set.identity());
        let started = Instant::now();

        self.database
            .execute(change_set)
            .map_err(|source| ChangeguardError::ExecutionFailed {
                change_set: change_set.identity().clone(),
                applied_before: self.applied.len(),
                source,
            })?;

        let exec_type = if self.previously_ran.contains(change_set.identity()) {
            ExecType::Reran
        } else {
            ExecType::Executed
        };
        let ran = self.database.mark_ran(change_set, exec_type, self.deployment_id)?;

        #[cfg(feature = "metrics")]
        METRICS.record_applied(started.elapsed());

        log::info!(
            "Changeset {} {} in {}ms",
            change_set.identity(),
            exec_type.as_str().to_ascii_lowercase(),
            started.elapsed().as_millis()
        );
        self.applied.push(ran);
        Ok(())
    }

    fn skip(&mut self, change_set: &ChangeSet, results: &[FilterResult]) -> Result<()> {
        #[cfg(feature = "metrics")]
        METRICS.record_skipped(results);

        log::debug!("Skipping changeset {}: {}", change_set.identity(), describe_rejections(results));
        Ok(())
    }
}
