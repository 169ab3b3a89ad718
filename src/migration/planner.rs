//! Deciding which migrations to run.

use std::collections::HashSet;

use super::{Direction, Migration, MigrationRecord};

/// A migration selected for execution in one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMigration {
    pub migration: Migration,
    pub direction: Direction,
}

impl PlannedMigration {
    pub fn id(&self) -> &str {
        &self.migration.id
    }

    pub fn statements(&self) -> &[String] {
        self.migration.statements(self.direction)
    }

    /// Dry-run rendering: a header line followed by each statement.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.statements().len() + 1);
        lines.push(format!(
            "==> Would apply migration {} ({})",
            self.id(),
            self.direction
        ));
        lines.extend(self.statements().iter().cloned());
        lines
    }
}

/// Select migrations to run.
///
/// Up picks every available migration without a ledger record, ascending by id.
/// Down picks every available migration with a record, descending by id. A
/// `limit` above zero truncates the plan. Records without a definition are
/// ignored.
pub fn plan(
    available: &[Migration],
    applied: &[MigrationRecord],
    direction: Direction,
    limit: usize,
) -> Vec<PlannedMigration> {
    let applied: HashSet<&str> = applied.iter().map(|record| record.id.as_str()).collect();

    let mut candidates: Vec<&Migration> = available
        .iter()
        .filter(|migration| match direction {
            Direction::Up => !applied.contains(migration.id.as_str()),
            Direction::Down => applied.contains(migration.id.as_str()),
        })
        .collect();

    match direction {
        Direction::Up => candidates.sort_by(|a, b| a.id.cmp(&b.id)),
        Direction::Down => candidates.sort_by(|a, b| b.id.cmp(&a.id)),
    }

    if limit > 0 {
        candidates.truncate(limit);
    }

    candidates
        .into_iter()
        .map(|migration| PlannedMigration {
            migration: migration.clone(),
            direction,
        })
        .collect()
}
