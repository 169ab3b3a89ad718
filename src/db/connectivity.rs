//! Connection-loss detection and the bounded reconnect loop.

use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DbErr, Statement};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Fragments of driver messages that mean the server went away mid-operation.
const CONNECTIVITY_MARKERS: &[&str] = &[
    "connection refused",
    "connection reset",
    "broken pipe",
    "server has gone away",
    "lost connection",
    "pool timed out",
];

/// How often and how long to probe for a database that went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    /// Probe every 2 seconds, give up after 1000 attempts (about 33 minutes).
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 1000,
        }
    }
}

/// Whether a database error means the connection itself is unavailable.
pub fn is_connectivity_error(err: &DbErr) -> bool {
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => true,
        other => {
            let message = other.to_string().to_lowercase();
            CONNECTIVITY_MARKERS
                .iter()
                .any(|marker| message.contains(marker))
        }
    }
}

/// Something that can wait until the database answers again.
#[async_trait]
pub trait ConnectionProbe: Send + Sync {
    /// Block until the database is reachable. Returns the number of attempts used.
    async fn wait_until_available(&self) -> AppResult<u32>;
}

/// Opens a fresh connection and runs `SELECT 1` until it succeeds or the policy is exhausted.
pub struct ReconnectProbe {
    database_url: String,
    policy: RetryPolicy,
}

impl ReconnectProbe {
    pub fn new(database_url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            database_url: database_url.into(),
            policy,
        }
    }

    async fn try_connect(&self) -> Result<(), DbErr> {
        let mut options = ConnectOptions::new(self.database_url.clone());
        options.max_connections(1).min_connections(0).sqlx_logging(false);

        let db = Database::connect(options).await?;
        let probe = Statement::from_string(db.get_database_backend(), "SELECT 1".to_owned());
        let result = db.query_one_raw(probe).await;
        // The probe connection is throwaway either way
        let _ = db.close().await;
        result.map(|_| ())
    }
}

#[async_trait]
impl ConnectionProbe for ReconnectProbe {
    async fn wait_until_available(&self) -> AppResult<u32> {
        for attempt in 1..=self.policy.max_attempts {
            match self.try_connect().await {
                Ok(()) => {
                    info!("DB connection re-established.");
                    return Ok(attempt);
                }
                Err(e) => {
                    info!("DB connection died, waiting for server... ({})", e);
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.interval).await;
                    }
                }
            }
        }

        warn!(
            "Giving up on database after {} attempts",
            self.policy.max_attempts
        );
        Err(AppError::Connectivity(format!(
            "database did not come back after {} attempts",
            self.policy.max_attempts
        )))
    }
}
