//! Changeguard CLI Tool
//!
//! Command-line interface for applying changelogs to PostgreSQL.
//! Supports both interactive use and CI/CD pipelines.

use anyhow::Context;
use changeguard::command::{self, validate_checksums, CommandStep, UpdateSummary};
use changeguard::connection::{connect, redact};
use changeguard::database::{PostgresDatabase, PostgresLockService};
use changeguard::{
    ChangeLog, ChangeguardConfig, ChangeguardError, Database, LockGuard, LockService, MayPostgresExecutor,
    UpdateArguments, UpdateCommandStep, UpdateCountCommandStep, UpdateToTagCommandStep,
};
use changeguard_cli::{changelog_file, output};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process;

#[derive(Parser)]
#[command(name = "changeguard")]
#[command(about = "Changelog-driven schema migrations for PostgreSQL")]
#[command(version = "0.1.0")]
struct Cli {
    /// Database connection URL
    #[arg(long)]
    database_url: Option<String>,

    /// Changelog file path
    #[arg(long)]
    changelog_file: Option<String>,

    /// Runtime contexts, comma separated
    #[arg(long)]
    contexts: Option<String>,

    /// Label expression, e.g. "billing and !beta"
    #[arg(long)]
    labels: Option<String>,

    /// Update summary verbosity: off, summary or verbose
    #[arg(long)]
    show_summary: Option<String>,

    /// Configuration file (default: config/changeguard.toml)
    #[arg(long)]
    config: Option<String>,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which changesets an update would apply, and why the rest are skipped
    Status {
        /// Preview an update-count run
        #[arg(long, conflicts_with = "tag")]
        count: Option<String>,

        /// Preview an update-to-tag run
        #[arg(long)]
        tag: Option<String>,
    },

    /// Apply every pending changeset
    Update {
        /// Show what would be applied without running anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply the next <COUNT> changesets
    UpdateCount {
        count: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Apply pending changesets up to and including the one carrying <TAG>
    UpdateToTag {
        tag: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Validate checksums of applied changesets
    Validate,

    /// Show the ledger of applied changesets
    History,

    /// Release the changelog lock left behind by an interrupted run
    ReleaseLocks,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if cli.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();
    } else if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    dotenv::dotenv().ok();

    match run(&cli) {
        Ok(()) => {
            if !cli.quiet && !cli.json {
                println!("{} Success", "✅".green());
            }
            process::exit(0);
        }
        Err(e) => {
            if let Some(ChangeguardError::ValidationFailed(failures)) = e.downcast_ref::<ChangeguardError>() {
                eprint!("{}", output::render_validation(failures));
            }
            eprintln!("{} Error: {e:#}", "❌".red());
            process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ChangeguardConfig> {
    let mut config = match &cli.config {
        Some(path) => ChangeguardConfig::load_from(path)?,
        None => ChangeguardConfig::load()?,
    };

    if let Some(url) = cli
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok())
    {
        config.database.url = url;
    }
    if let Some(file) = &cli.changelog_file {
        config.changelog_file = file.clone();
    }
    if cli.contexts.is_some() {
        config.contexts = cli.contexts.clone();
    }
    if cli.labels.is_some() {
        config.labels = cli.labels.clone();
    }
    if let Some(show_summary) = &cli.show_summary {
        config.show_summary = show_summary.parse::<UpdateSummary>()?;
    }
    Ok(config)
}

/// The step for a command, built before any database access
fn command_step(command: &Commands) -> anyhow::Result<Option<Box<dyn CommandStep>>> {
    let step: Box<dyn CommandStep> = match command {
        Commands::Status { count: Some(count), .. } => Box::new(UpdateCountCommandStep::from_arguments(Some(count))?),
        Commands::Status { tag: Some(tag), .. } => Box::new(UpdateToTagCommandStep::from_arguments(Some(tag))?),
        Commands::Status { .. } | Commands::Update { .. } => Box::new(UpdateCommandStep),
        Commands::UpdateCount { count, .. } => Box::new(UpdateCountCommandStep::from_arguments(Some(count))?),
        Commands::UpdateToTag { tag, .. } => Box::new(UpdateToTagCommandStep::from_arguments(Some(tag))?),
        Commands::Validate | Commands::History | Commands::ReleaseLocks => return Ok(None),
    };
    Ok(Some(step))
}

fn is_dry_run(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Status { .. }
            | Commands::Update { dry_run: true }
            | Commands::UpdateCount { dry_run: true, .. }
            | Commands::UpdateToTag { dry_run: true, .. }
    )
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let arguments = config.update_arguments()?;
    let step = command_step(&cli.command)?;
    let change_log = match &cli.command {
        Commands::History | Commands::ReleaseLocks => None,
        _ => Some(changelog_file::load(&config.changelog_file)?),
    };

    log::info!("Connecting to {}", redact(&config.database.url));
    let client = connect(&config.database.url)
        .map_err(ChangeguardError::from)
        .context("Error connecting to database")?;
    let executor = MayPostgresExecutor::new(client);

    // read-only commands never create the ledger or lock tables
    let mut database = PostgresDatabase::new(&executor, config.ledger_table.as_str())?;
    let locks = PostgresLockService::new(&executor, config.lock_table.as_str(), config.lock_timeout_seconds)?;

    match (&cli.command, step, change_log) {
        (Commands::ReleaseLocks, _, _) => handle_release_locks(&locks),
        (Commands::History, _, _) => handle_history(cli, &database),
        (Commands::Validate, _, Some(change_log)) => handle_validate(cli, &database, &change_log),
        (command, Some(step), Some(change_log)) if is_dry_run(command) => {
            handle_status(cli, step.as_ref(), &database, &change_log, &arguments)
        }
        (_, Some(step), Some(change_log)) => {
            database.initialize()?;
            locks.initialize()?;
            let _guard = LockGuard::acquire(&locks)?;
            handle_update(cli, step.as_ref(), &mut database, &change_log, &arguments)
        }
        _ => anyhow::bail!("no changelog loaded for this command"),
    }
}

fn handle_status(
    cli: &Cli,
    step: &dyn CommandStep,
    database: &PostgresDatabase<'_>,
    change_log: &ChangeLog,
    arguments: &UpdateArguments,
) -> anyhow::Result<()> {
    let report = command::status(step, database, change_log, arguments)?;
    if cli.json {
        println!("{}", output::to_json(&report)?);
    } else {
        print!("{}", output::render_status(&report));
    }
    Ok(())
}

fn handle_update(
    cli: &Cli,
    step: &dyn CommandStep,
    database: &mut PostgresDatabase<'_>,
    change_log: &ChangeLog,
    arguments: &UpdateArguments,
) -> anyhow::Result<()> {
    if !cli.quiet && !cli.json {
        println!("Applying changesets ({})...", step.operation());
    }
    let report = command::update(step, database, change_log, arguments)?;
    if cli.json {
        println!("{}", output::to_json(report.metadata())?);
    } else if !cli.quiet {
        print!("{}", output::render_update(&report));
    }
    Ok(())
}

fn handle_validate(cli: &Cli, database: &PostgresDatabase<'_>, change_log: &ChangeLog) -> anyhow::Result<()> {
    let failures = validate_checksums(change_log, &database.ran_change_sets()?);
    if cli.json {
        println!("{}", output::to_json(&failures)?);
    } else {
        print!("{}", output::render_validation(&failures));
    }
    if !failures.is_empty() {
        anyhow::bail!("{} changeset(s) were modified after they ran", failures.len());
    }
    Ok(())
}

fn handle_history(cli: &Cli, database: &PostgresDatabase<'_>) -> anyhow::Result<()> {
    let ran_change_sets = database.ran_change_sets()?;
    if cli.json {
        println!("{}", output::to_json(&ran_change_sets)?);
    } else {
        print!("{}", output::render_history(&ran_change_sets));
    }
    Ok(())
}

fn handle_release_locks(locks: &PostgresLockService<'_>) -> anyhow::Result<()> {
    if locks.is_locked()? {
        locks.release()?;
        println!("Released the changelog lock");
    } else {
        println!("The changelog lock is not held");
    }
    Ok(())
}
