//! Migration commands: up/down, skip, redo, status, new, install and seed.
//!
//! Every command opens its own pool from the configuration and closes it
//! before returning.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::Config;
use crate::db::DbPool;
use crate::db::connectivity::{ConnectionProbe, ReconnectProbe, RetryPolicy};
use crate::error::{AppError, AppResult};
use crate::migration::base::{BaseInstallReport, install_base};
use crate::migration::seed::{build_query, seed_migration};
use crate::migration::{
    Direction, FileMigrationSource, MAX_PLAN_RESTARTS, MemoryMigrationSource, MigrationExecutor,
    MigrationLedger, MigrationSource, PlannedMigration, plan,
};

/// How a plan is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run statements and record them
    Apply,
    /// Record without running statements
    Skip,
    /// Only plan
    DryRun,
}

/// Result of running (or planning) migrations.
#[derive(Debug, Clone, Default)]
pub struct MigrationOutcome {
    /// Migrations selected by the plan, in execution order
    pub planned: Vec<PlannedMigration>,
    /// Ledger records changed
    pub applied: usize,
    /// Statements sent to the database
    pub statements_executed: usize,
}

impl MigrationOutcome {
    /// Dry-run rendering of the plan.
    pub fn describe(&self) -> Vec<String> {
        self.planned.iter().flat_map(|p| p.describe()).collect()
    }

    pub fn applied_message(&self) -> String {
        match self.applied {
            1 => "Applied 1 migration".to_string(),
            n => format!("Applied {} migrations", n),
        }
    }

    pub fn skipped_message(&self) -> String {
        match self.applied {
            0 => "All migrations have already been applied".to_string(),
            1 => "Skipped 1 migration".to_string(),
            n => format!("Skipped {} migrations", n),
        }
    }
}

/// One line of the status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub id: String,
    /// `None` when the migration is not applied
    pub applied_at: Option<DateTime<Utc>>,
    pub applied: bool,
}

/// Applied state of every available migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub rows: Vec<StatusRow>,
    /// Ledger ids with no migration file
    pub missing: Vec<String>,
}

/// Result of `install`.
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    /// Present when the base dataset was installed by this run
    pub base: Option<BaseInstallReport>,
    pub migrations: MigrationOutcome,
}

/// Result of the market seed.
#[derive(Debug, Clone, Default)]
pub struct SeedOutcome {
    /// (region, query) pairs
    pub queries: Vec<(String, String)>,
    pub applied: usize,
}

fn probe_for(config: &Config) -> ReconnectProbe {
    ReconnectProbe::new(config.database_url.clone(), RetryPolicy::default())
}

/// Plan against `ledger` and carry the plan out.
///
/// When the connection drops mid-plan and the probe brings it back, the plan is
/// computed again from the ledger and resumed, at most [`MAX_PLAN_RESTARTS`]
/// times.
pub async fn run_migrations(
    pool: &DbPool,
    ledger: MigrationLedger,
    source: &dyn MigrationSource,
    probe: &dyn ConnectionProbe,
    direction: Direction,
    mode: RunMode,
    limit: usize,
) -> AppResult<MigrationOutcome> {
    let available = ledger.list_available(source)?;
    let mut outcome = MigrationOutcome::default();
    let mut restarts = 0;

    loop {
        let applied = ledger.list_applied(pool.connection()).await?;
        let remaining = if limit > 0 {
            limit.saturating_sub(outcome.applied)
        } else {
            0
        };
        let planned = plan(&available, &applied, direction, remaining);
        if outcome.planned.is_empty() {
            outcome.planned = planned.clone();
        }

        if mode == RunMode::DryRun {
            return Ok(outcome);
        }

        let mut executor = MigrationExecutor::new(pool.connection(), ledger).with_probe(probe);
        let result = executor.apply(&planned, mode == RunMode::Skip).await;
        outcome.statements_executed += executor.statements_executed();

        match result {
            Ok(n) => {
                outcome.applied += n;
                return Ok(outcome);
            }
            Err(AppError::Interrupted { id }) if restarts < MAX_PLAN_RESTARTS => {
                restarts += 1;
                outcome.applied += count_recorded_before(&planned, &id);
                warn!(
                    "Restarting plan after connection loss at {} (attempt {})",
                    id, restarts
                );
                if limit > 0 && outcome.applied >= limit {
                    return Ok(outcome);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

fn count_recorded_before(planned: &[PlannedMigration], failed_id: &str) -> usize {
    planned
        .iter()
        .position(|p| p.id() == failed_id)
        .unwrap_or(planned.len())
}

/// Apply schema migrations in `direction`. `limit` 0 means no limit.
pub async fn apply_migrations(
    config: &Config,
    direction: Direction,
    dry_run: bool,
    limit: usize,
) -> AppResult<MigrationOutcome> {
    let mode = if dry_run { RunMode::DryRun } else { RunMode::Apply };
    run_schema(config, direction, mode, limit).await
}

/// Record schema migrations as applied without running them.
pub async fn skip_migrations(
    config: &Config,
    direction: Direction,
    limit: usize,
) -> AppResult<MigrationOutcome> {
    run_schema(config, direction, RunMode::Skip, limit).await
}

async fn run_schema(
    config: &Config,
    direction: Direction,
    mode: RunMode,
    limit: usize,
) -> AppResult<MigrationOutcome> {
    let source = FileMigrationSource::new(&config.migrations_dir);
    let probe = probe_for(config);
    let pool = DbPool::new(config).await?;

    let result = run_migrations(
        &pool,
        MigrationLedger::schema(),
        &source,
        &probe,
        direction,
        mode,
        limit,
    )
    .await;
    pool.close().await?;
    result
}

/// Revert the most recently applied migration and apply it again.
pub async fn redo_migration(config: &Config, dry_run: bool) -> AppResult<MigrationOutcome> {
    let source = FileMigrationSource::new(&config.migrations_dir);
    let ledger = MigrationLedger::schema();
    let probe = probe_for(config);
    let pool = DbPool::new(config).await?;

    let result = redo_with(&pool, ledger, &source, &probe, dry_run).await;
    pool.close().await?;
    result
}

/// Redo against an explicit pool and source.
pub async fn redo_with(
    pool: &DbPool,
    ledger: MigrationLedger,
    source: &dyn MigrationSource,
    probe: &dyn ConnectionProbe,
    dry_run: bool,
) -> AppResult<MigrationOutcome> {
    let available = ledger.list_available(source)?;
    let applied = ledger.list_applied(pool.connection()).await?;

    let Some(down) = plan(&available, &applied, Direction::Down, 1).pop() else {
        return Err(AppError::NotFound("Applied migration to redo".to_string()));
    };
    let up = PlannedMigration {
        migration: down.migration.clone(),
        direction: Direction::Up,
    };

    let mut outcome = MigrationOutcome {
        planned: vec![down, up],
        ..Default::default()
    };
    if dry_run {
        return Ok(outcome);
    }

    let mut executor = MigrationExecutor::new(pool.connection(), ledger).with_probe(probe);
    let result = executor.apply(&outcome.planned, false).await;
    outcome.statements_executed = executor.statements_executed();
    outcome.applied = result?;
    info!("Reapplied migration {}", outcome.planned[0].id());
    Ok(outcome)
}

/// Applied state of every schema migration file.
pub async fn migration_status(config: &Config) -> AppResult<StatusReport> {
    let source = FileMigrationSource::new(&config.migrations_dir);
    let pool = DbPool::new(config).await?;

    let result = status_with(&pool, MigrationLedger::schema(), &source).await;
    pool.close().await?;
    result
}

/// Status against an explicit pool and source.
pub async fn status_with(
    pool: &DbPool,
    ledger: MigrationLedger,
    source: &dyn MigrationSource,
) -> AppResult<StatusReport> {
    let available = ledger.list_available(source)?;
    let records = ledger.list_applied(pool.connection()).await?;

    let missing: Vec<String> = records
        .iter()
        .filter(|record| !available.iter().any(|m| m.id == record.id))
        .map(|record| record.id.clone())
        .collect();
    for id in &missing {
        warn!("Could not find migration file: {}", id);
    }

    let rows = available
        .iter()
        .map(|migration| {
            let record = records.iter().find(|record| record.id == migration.id);
            StatusRow {
                id: migration.id.clone(),
                applied_at: record.and_then(|record| record.applied_at),
                applied: record.is_some(),
            }
        })
        .collect();

    Ok(StatusReport { rows, missing })
}

/// Write an empty migration file named `<timestamp>-<name>.sql`.
pub fn new_migration(config: &Config, name: &str) -> AppResult<PathBuf> {
    let name = name.trim();
    if name.is_empty() || name.contains(|c| c == '/' || c == '\\') {
        return Err(AppError::Validation(format!(
            "Invalid migration name '{}'",
            name
        )));
    }

    std::fs::create_dir_all(&config.migrations_dir)?;
    let filename = format!("{}-{}.sql", Utc::now().format("%Y%m%d%H%M%S"), name);
    let path = config.migrations_dir.join(filename);
    if path.exists() {
        return Err(AppError::Validation(format!(
            "{} already exists",
            path.display()
        )));
    }

    std::fs::write(&path, "\n-- +migrate Up\n\n-- +migrate Down\n")?;
    info!("Created migration {}", path.display());
    Ok(path)
}

/// Install the base dataset into an empty database, then migrate up.
///
/// A dry run never installs the base dataset.
pub async fn install(config: &Config, dry_run: bool, limit: usize) -> AppResult<InstallReport> {
    let mut report = InstallReport::default();

    if dry_run {
        info!("Dry run, not installing base.");
    } else {
        let pool = DbPool::fresh(config).await?;
        let tables = pool.count_tables().await;
        pool.close().await?;
        let tables = tables?;

        info!("Number of tables in DB: {}", tables);
        if tables == 0 {
            info!("Database not initialized, installing...");
            report.base = Some(install_base(config, &probe_for(config)).await?);
        } else {
            info!("Base database already installed. Won't overwrite.");
        }
    }

    report.migrations = apply_migrations(config, Direction::Up, dry_run, limit).await?;
    Ok(report)
}

/// Seed market orders into the configured regions.
///
/// Refuses to run against a database without tables. A dry run only builds
/// the queries.
pub async fn seed_market(config: &Config, dry_run: bool) -> AppResult<SeedOutcome> {
    let mut outcome = SeedOutcome::default();
    for region in &config.seed_regions {
        let query = build_query(region, config.seed_saturation)?;
        outcome.queries.push((region.clone(), query));
    }

    if dry_run {
        return Ok(outcome);
    }

    let pool = DbPool::fresh(config).await?;
    let result = seed_with(&pool, config, &outcome).await;
    pool.close().await?;
    outcome.applied = result?;
    Ok(outcome)
}

async fn seed_with(pool: &DbPool, config: &Config, outcome: &SeedOutcome) -> AppResult<usize> {
    if pool.count_tables().await? == 0 {
        return Err(AppError::Validation(
            "Database not initialized, please install the DB first".to_string(),
        ));
    }

    info!("Seeding market...");
    let queries = outcome.queries.iter().map(|(_, query)| query.clone()).collect();
    let source = MemoryMigrationSource::new(vec![seed_migration(queries)]);

    let result = run_migrations(
        pool,
        MigrationLedger::seed(),
        &source,
        &probe_for(config),
        Direction::Up,
        RunMode::Apply,
        0,
    )
    .await?;
    info!("Successfully applied {} migration!", result.applied);
    Ok(result.applied)
}
