//! Running planned migrations and keeping the ledger in step.
//!
//! Each migration runs in its own transaction together with its ledger write, so
//! a record exists only if every statement succeeded. A failure stops the plan;
//! earlier migrations stay applied.

use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use tracing::{debug, error, info, trace, warn};

use crate::db::connectivity::{ConnectionProbe, is_connectivity_error};
use crate::error::{AppError, AppResult};

use super::{Direction, MigrationLedger, PlannedMigration};

/// Applies a plan against one database and ledger.
pub struct MigrationExecutor<'a> {
    db: &'a DatabaseConnection,
    ledger: MigrationLedger,
    probe: Option<&'a dyn ConnectionProbe>,
    statements_executed: usize,
}

impl<'a> MigrationExecutor<'a> {
    pub fn new(db: &'a DatabaseConnection, ledger: MigrationLedger) -> Self {
        Self {
            db,
            ledger,
            probe: None,
            statements_executed: 0,
        }
    }

    /// Wait for the database with `probe` when the connection drops mid-plan.
    pub fn with_probe(mut self, probe: &'a dyn ConnectionProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Statements sent to the database so far.
    pub fn statements_executed(&self) -> usize {
        self.statements_executed
    }

    /// Apply `plan` in order and return how many ledger records changed.
    ///
    /// With `skip`, ledger records are written without running any statement.
    ///
    /// # Errors
    ///
    /// - `Execution` when a statement fails; the failing and later migrations
    ///   are left unrecorded.
    /// - `Interrupted` when the connection dropped and came back; the caller
    ///   may plan again and retry.
    /// - `Connectivity` when the connection dropped and did not come back.
    pub async fn apply(&mut self, plan: &[PlannedMigration], skip: bool) -> AppResult<usize> {
        if plan.is_empty() {
            return Ok(0);
        }

        match self.ledger.ensure_table(self.db).await {
            Ok(()) => {}
            Err(AppError::Connectivity(cause)) => {
                return Err(self.recover(plan[0].id(), cause).await);
            }
            Err(e) => return Err(e),
        }

        let mut applied = 0;
        for planned in plan {
            match self.apply_one(planned, skip).await {
                Ok(()) => applied += 1,
                Err(AppError::Connectivity(cause)) => {
                    return Err(self.recover(planned.id(), cause).await);
                }
                Err(e) => {
                    error!("Migration {} failed: {}", planned.id(), e);
                    return Err(e);
                }
            }
        }

        Ok(applied)
    }

    async fn apply_one(&mut self, planned: &PlannedMigration, skip: bool) -> AppResult<()> {
        let id = planned.id();
        if skip {
            debug!("Skipping migration {} ({})", id, planned.direction);
        } else {
            info!("Applying migration {} ({})", id, planned.direction);
        }

        let txn = self.db.begin().await?;

        if !skip {
            for statement in planned.statements() {
                trace!("{}", statement);
                if let Err(e) = txn.execute_unprepared(statement).await {
                    if is_connectivity_error(&e) {
                        return Err(AppError::Connectivity(e.to_string()));
                    }
                    return Err(AppError::Execution {
                        id: id.to_string(),
                        cause: e.to_string(),
                    });
                }
                self.statements_executed += 1;
            }
        }

        match planned.direction {
            Direction::Up => self.ledger.record_applied(&txn, id).await?,
            Direction::Down => {
                if !self.ledger.remove_record(&txn, id).await? {
                    warn!("No ledger record for {} in {}", id, self.ledger.table());
                }
            }
        }

        txn.commit().await?;
        Ok(())
    }

    async fn recover(&self, id: &str, cause: String) -> AppError {
        warn!("Connection lost while applying {}: {}", id, cause);
        let Some(probe) = self.probe else {
            return AppError::Connectivity(cause);
        };

        match probe.wait_until_available().await {
            Ok(_) => AppError::Interrupted { id: id.to_string() },
            Err(e) => e,
        }
    }
}
