//! One-time install of the gzipped base dataset.
//!
//! Every file under the base directory becomes one irreversible migration with
//! id `BASE_<path>`, tracked in the `base_migrations` ledger. Each file gets a
//! fresh single-connection pool. A file that cannot be read is reported and
//! the remaining files are still installed. A file interrupted by a lost
//! connection is started over once the database is back.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::db::DbPool;
use crate::db::connectivity::ConnectionProbe;
use crate::error::{AppError, AppResult};

use super::chunker::read_gz_statements;
use super::{Direction, MAX_PLAN_RESTARTS, Migration, MigrationExecutor, MigrationLedger, plan};

/// Prefix of every base migration id.
pub const BASE_ID_PREFIX: &str = "BASE_";

/// A base file that could not be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseFileFailure {
    pub file: String,
    pub cause: String,
}

/// Outcome of a base install.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseInstallReport {
    /// Files applied by this run
    pub applied: usize,
    /// Files already in the ledger
    pub already_installed: usize,
    pub failures: Vec<BaseFileFailure>,
}

/// Every regular file under `dir`, recursively, sorted by path.
pub fn collect_base_files(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_into(dir, &mut files).map_err(|e| {
        AppError::FileSystem(format!("Failed to read base directory {}: {}", dir.display(), e))
    })?;
    files.sort();
    Ok(files)
}

fn collect_into(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_into(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Irreversible migration for one base file.
pub fn base_migration(path: &Path, statements: Vec<String>) -> Migration {
    debug!("Building migration for base file {}", path.display());
    Migration::new(
        format!("{}{}", BASE_ID_PREFIX, path.display()),
        statements,
        Vec::new(),
    )
}

/// Install every file in the configured base directory.
///
/// Read and statement failures are collected per file. Only a database that
/// stays unreachable aborts the run.
pub async fn install_base(
    config: &Config,
    probe: &dyn ConnectionProbe,
) -> AppResult<BaseInstallReport> {
    let files = collect_base_files(&config.base_dir)?;
    trace!("Base files to install: {:?}", files);

    let ledger = MigrationLedger::base();
    let mut report = BaseInstallReport::default();

    for file in files {
        debug!("Decompressing {}...", file.display());
        let statements = match read_gz_statements(&file) {
            Ok(statements) => statements,
            Err(e) => {
                error!("Failed to read {}: {}", file.display(), e);
                report.failures.push(BaseFileFailure {
                    file: file.display().to_string(),
                    cause: e.to_string(),
                });
                continue;
            }
        };

        info!("Building migration for {}...", file.display());
        let migration = base_migration(&file, statements);

        match install_with_restarts(config, ledger, probe, &migration).await {
            Ok(0) => report.already_installed += 1,
            Ok(n) => {
                info!("Applied {} migrations!", n);
                report.applied += n;
            }
            Err(AppError::Connectivity(cause)) => return Err(AppError::Connectivity(cause)),
            Err(e) => {
                error!("Error installing migration: {}", e);
                report.failures.push(BaseFileFailure {
                    file: file.display().to_string(),
                    cause: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// Install one file, starting it over each time the connection drops and comes
/// back, at most [`MAX_PLAN_RESTARTS`] times.
async fn install_with_restarts(
    config: &Config,
    ledger: MigrationLedger,
    probe: &dyn ConnectionProbe,
    migration: &Migration,
) -> AppResult<usize> {
    let mut restarts = 0;
    loop {
        match install_file(config, ledger, probe, migration).await {
            Err(AppError::Interrupted { id }) if restarts < MAX_PLAN_RESTARTS => {
                restarts += 1;
                warn!(
                    "Restarting {} after connection loss (attempt {})",
                    id, restarts
                );
            }
            result => return result,
        }
    }
}

async fn install_file(
    config: &Config,
    ledger: MigrationLedger,
    probe: &dyn ConnectionProbe,
    migration: &Migration,
) -> AppResult<usize> {
    let pool = match DbPool::fresh(config).await {
        Ok(pool) => pool,
        Err(e) => return Err(wait_for_database(probe, &migration.id, e).await),
    };
    let result = install_one(&pool, ledger, probe, migration).await;
    pool.close().await?;
    result
}

async fn install_one(
    pool: &DbPool,
    ledger: MigrationLedger,
    probe: &dyn ConnectionProbe,
    migration: &Migration,
) -> AppResult<usize> {
    let applied = match ledger.list_applied(pool.connection()).await {
        Ok(applied) => applied,
        Err(e) => return Err(wait_for_database(probe, &migration.id, e).await),
    };
    let planned = plan(std::slice::from_ref(migration), &applied, Direction::Up, 0);

    let mut executor = MigrationExecutor::new(pool.connection(), ledger).with_probe(probe);
    executor.apply(&planned, false).await
}

/// Turn a lost connection into `Interrupted` once the database answers again.
/// Any other error is returned unchanged.
async fn wait_for_database(probe: &dyn ConnectionProbe, id: &str, err: AppError) -> AppError {
    let AppError::Connectivity(cause) = err else {
        return err;
    };

    warn!("Connection lost before applying {}: {}", id, cause);
    match probe.wait_until_available().await {
        Ok(_) => AppError::Interrupted { id: id.to_string() },
        Err(e) => e,
    }
}
