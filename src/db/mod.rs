//! Database module providing connection management, dungeon storage and id allocation.

pub mod connectivity;
pub mod dungeons;
pub mod id_allocator;

use sea_orm::sea_query::{
    MysqlQueryBuilder, QueryStatementWriter, SchemaStatementBuilder, SqliteQueryBuilder, Values,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, QueryResult,
    Statement,
};
use tracing::debug;

use crate::config::{Config, PoolSettings};
use crate::error::{AppError, AppResult};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Open the shared pool described by the configuration.
    pub async fn new(config: &Config) -> AppResult<Self> {
        Self::connect(&config.database_url, &config.pool).await
    }

    /// Open a pool holding a single connection.
    ///
    /// Base installs use one of these per dump file so a long run over many
    /// files never exhausts the shared pool.
    pub async fn fresh(config: &Config) -> AppResult<Self> {
        let settings = PoolSettings {
            max_connections: 1,
            min_connections: 0,
            max_lifetime: config.pool.max_lifetime,
        };
        Self::connect(&config.database_url, &settings).await
    }

    async fn connect(database_url: &str, settings: &PoolSettings) -> AppResult<Self> {
        let mut options = ConnectOptions::new(database_url.to_owned());
        options
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .max_lifetime(settings.max_lifetime)
            .sqlx_logging(false);

        let conn = Database::connect(options)
            .await
            .map_err(|e| AppError::Connectivity(format!("Failed to open database: {}", e)))?;
        debug!(
            "Opened database pool (max {} connections)",
            settings.max_connections
        );

        Ok(DbPool { conn })
    }

    /// Get access to the connection for executing queries.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Number of tables in the current database (zero means nothing is installed).
    pub async fn count_tables(&self) -> AppResult<i64> {
        let backend = self.conn.get_database_backend();
        let sql = match backend {
            DatabaseBackend::Sqlite => {
                "SELECT COUNT(*) AS table_count FROM sqlite_master WHERE type = 'table'"
            }
            _ => {
                "SELECT COUNT(*) AS table_count FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = DATABASE()"
            }
        };

        let row = self
            .conn
            .query_one_raw(Statement::from_string(backend, sql.to_owned()))
            .await?
            .ok_or_else(|| AppError::Database("Table count query returned no rows".to_string()))?;

        Ok(row.try_get::<i64>("", "table_count")?)
    }

    /// Close every connection held by the pool.
    pub async fn close(self) -> AppResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

fn build_stmt<S: QueryStatementWriter>(backend: DatabaseBackend, stmt: &S) -> (String, Values) {
    match backend {
        DatabaseBackend::Sqlite => stmt.build(SqliteQueryBuilder),
        _ => stmt.build(MysqlQueryBuilder),
    }
}

/// Execute a built query on any connection or transaction.
pub(crate) async fn exec<C, S>(conn: &C, stmt: &S) -> AppResult<u64>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let result = conn
        .execute_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn exec_schema<C, S>(conn: &C, stmt: &S) -> AppResult<()>
where
    C: ConnectionTrait,
    S: SchemaStatementBuilder,
{
    let backend = conn.get_database_backend();
    let sql = match backend {
        DatabaseBackend::Sqlite => stmt.build(SqliteQueryBuilder),
        _ => stmt.build(MysqlQueryBuilder),
    };
    conn.execute_raw(Statement::from_string(backend, sql)).await?;
    Ok(())
}

pub(crate) async fn query_all<C, S>(conn: &C, stmt: &S) -> AppResult<Vec<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let rows = conn
        .query_all_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(rows)
}

pub(crate) async fn query_one<C, S>(conn: &C, stmt: &S) -> AppResult<Option<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let row = conn
        .query_one_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(row)
}
