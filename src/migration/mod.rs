//! Versioned SQL migrations.
//!
//! Migrations are plain SQL statement lists identified by a sortable id. A
//! ledger table records which ids are applied; the planner diffs the ledger
//! against the available definitions and the executor applies the result one
//! migration per transaction.

pub mod base;
pub mod chunker;
pub mod executor;
pub mod ledger;
pub mod planner;
pub mod seed;
pub mod source;

use chrono::{DateTime, Utc};

/// How many times a plan is restarted after the connection dropped and came back.
pub const MAX_PLAN_RESTARTS: u32 = 3;

pub use executor::MigrationExecutor;
pub use ledger::MigrationLedger;
pub use planner::{PlannedMigration, plan};
pub use source::{FileMigrationSource, MemoryMigrationSource, MigrationSource};

/// A single schema change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Unique id; ids sort lexicographically into apply order
    pub id: String,
    /// Statements run when migrating up
    pub up: Vec<String>,
    /// Statements run when migrating down
    pub down: Vec<String>,
}

impl Migration {
    pub fn new(id: impl Into<String>, up: Vec<String>, down: Vec<String>) -> Self {
        Self {
            id: id.into(),
            up,
            down,
        }
    }

    /// Statements for the given direction.
    pub fn statements(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }
}

/// Direction to migrate in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger entry for an applied migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub id: String,
    pub applied_at: Option<DateTime<Utc>>,
}
