//! Ledger tables recording applied migrations.
//!
//! Each ledger is a two-column table (`id`, `applied_at`). Schema migrations,
//! base installs and market seeds each use their own table so the three never
//! see each other's records.

use chrono::{NaiveDateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use sea_orm::sea_query::{Alias, ColumnDef, Expr, ExprTrait, Order, Query, Table};
use tracing::debug;

use crate::db::{exec, exec_schema, query_all};
use crate::error::AppResult;

use super::{MigrationRecord, MigrationSource, Migration};

/// Ledger for versioned schema migrations.
pub const SCHEMA_LEDGER: &str = "migrations";
/// Ledger for gzipped base dumps.
pub const BASE_LEDGER: &str = "base_migrations";
/// Ledger for market seed runs.
pub const SEED_LEDGER: &str = "seed_migrations";

/// A migration ledger bound to one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationLedger {
    table: &'static str,
}

impl MigrationLedger {
    pub const fn new(table: &'static str) -> Self {
        Self { table }
    }

    pub const fn schema() -> Self {
        Self::new(SCHEMA_LEDGER)
    }

    pub const fn base() -> Self {
        Self::new(BASE_LEDGER)
    }

    pub const fn seed() -> Self {
        Self::new(SEED_LEDGER)
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Create the ledger table if it does not exist yet.
    pub async fn ensure_table<C: ConnectionTrait>(&self, conn: &C) -> AppResult<()> {
        let create = Table::create()
            .table(Alias::new(self.table))
            .if_not_exists()
            .col(
                ColumnDef::new(Alias::new("id"))
                    .string_len(255)
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Alias::new("applied_at")).date_time().null())
            .to_owned();

        exec_schema(conn, &create).await
    }

    /// Whether the ledger table exists.
    pub async fn exists<C: ConnectionTrait>(&self, conn: &C) -> AppResult<bool> {
        let backend = conn.get_database_backend();
        let sql = match backend {
            DatabaseBackend::Sqlite => {
                "SELECT COUNT(*) AS table_count FROM sqlite_master WHERE type = 'table' AND name = ?"
            }
            _ => {
                "SELECT COUNT(*) AS table_count FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?"
            }
        };

        let row = conn
            .query_one_raw(Statement::from_sql_and_values(
                backend,
                sql,
                [self.table.into()],
            ))
            .await?;
        let count: i64 = match row {
            Some(row) => row.try_get("", "table_count")?,
            None => 0,
        };
        Ok(count > 0)
    }

    /// Record `id` as applied now.
    pub async fn record_applied<C: ConnectionTrait>(&self, conn: &C, id: &str) -> AppResult<()> {
        self.record_applied_at(conn, id, Utc::now().naive_utc()).await
    }

    /// Record `id` as applied at a given time.
    pub async fn record_applied_at<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
        applied_at: NaiveDateTime,
    ) -> AppResult<()> {
        let insert = Query::insert()
            .into_table(Alias::new(self.table))
            .columns([Alias::new("id"), Alias::new("applied_at")])
            .values_panic([id.into(), applied_at.into()])
            .to_owned();

        exec(conn, &insert).await?;
        debug!("Recorded {} in {}", id, self.table);
        Ok(())
    }

    /// Remove the record for `id`. Returns whether a record existed.
    pub async fn remove_record<C: ConnectionTrait>(&self, conn: &C, id: &str) -> AppResult<bool> {
        let delete = Query::delete()
            .from_table(Alias::new(self.table))
            .and_where(Expr::col(Alias::new("id")).eq(id))
            .to_owned();

        let removed = exec(conn, &delete).await?;
        debug!("Removed {} from {}", id, self.table);
        Ok(removed > 0)
    }

    /// All applied records ordered by id. A missing table reads as empty.
    pub async fn list_applied<C: ConnectionTrait>(&self, conn: &C) -> AppResult<Vec<MigrationRecord>> {
        if !self.exists(conn).await? {
            return Ok(Vec::new());
        }

        let select = Query::select()
            .columns([Alias::new("id"), Alias::new("applied_at")])
            .from(Alias::new(self.table))
            .order_by(Alias::new("id"), Order::Asc)
            .to_owned();

        let rows = query_all(conn, &select).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let applied_at: Option<NaiveDateTime> = row.try_get("", "applied_at")?;
            records.push(MigrationRecord {
                id: row.try_get("", "id")?,
                applied_at: applied_at.map(|at| at.and_utc()),
            });
        }
        Ok(records)
    }

    /// Available definitions from `source`, in apply order.
    pub fn list_available(&self, source: &dyn MigrationSource) -> AppResult<Vec<Migration>> {
        source.list_available()
    }
}
