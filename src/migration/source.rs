//! Where migration definitions come from.
//!
//! Migration files are plain `.sql` files named by their id and split into
//! sections by marker comments:
//!
//! ```sql
//! -- +migrate Up
//! CREATE TABLE foo (id INT);
//!
//! -- +migrate Down
//! DROP TABLE foo;
//! ```
//!
//! Statements end at a line ending in `;`. Bodies that contain semicolons of
//! their own (triggers, procedures) go between `-- +migrate StatementBegin` and
//! `-- +migrate StatementEnd`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppError, AppResult};

use super::{Direction, Migration};

const MARKER_PREFIX: &str = "-- +migrate";

/// Supplies migration definitions in apply order.
pub trait MigrationSource: Send + Sync {
    /// All available migrations, sorted ascending by id.
    fn list_available(&self) -> AppResult<Vec<Migration>>;
}

/// Migrations held in memory (base installs, seeds, tests).
#[derive(Debug, Clone, Default)]
pub struct MemoryMigrationSource {
    migrations: Vec<Migration>,
}

impl MemoryMigrationSource {
    pub fn new(migrations: Vec<Migration>) -> Self {
        Self { migrations }
    }
}

impl MigrationSource for MemoryMigrationSource {
    fn list_available(&self) -> AppResult<Vec<Migration>> {
        let mut migrations = self.migrations.clone();
        migrations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(migrations)
    }
}

/// Migrations read from the `*.sql` files of one directory.
#[derive(Debug, Clone)]
pub struct FileMigrationSource {
    dir: PathBuf,
}

impl FileMigrationSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl MigrationSource for FileMigrationSource {
    fn list_available(&self) -> AppResult<Vec<Migration>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            AppError::FileSystem(format!(
                "Failed to read migrations directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut migrations = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "sql") {
                continue;
            }
            let Some(id) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };

            let contents = std::fs::read_to_string(&path)?;
            let migration = parse_migration(id, &contents).map_err(|cause| AppError::Parse {
                file: path.display().to_string(),
                cause,
            })?;
            debug!(
                "Found migration {} ({} up, {} down)",
                migration.id,
                migration.up.len(),
                migration.down.len()
            );
            migrations.push(migration);
        }

        migrations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(migrations)
    }
}

/// Parse one migration file.
pub fn parse_migration(id: &str, contents: &str) -> Result<Migration, String> {
    let mut up = Vec::new();
    let mut down = Vec::new();
    let mut section: Option<Direction> = None;
    let mut in_block = false;
    let mut current = String::new();

    for (index, line) in contents.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();

        if let Some(marker) = trimmed.strip_prefix(MARKER_PREFIX) {
            let command = marker.split_whitespace().next().unwrap_or_default();
            match command {
                "Up" | "Down" => {
                    if in_block {
                        return Err(format!("line {}: section marker inside StatementBegin", line_no));
                    }
                    if !current.trim().is_empty() {
                        return Err(format!("line {}: statement not terminated with ';'", line_no));
                    }
                    current.clear();
                    section = Some(if command == "Up" {
                        Direction::Up
                    } else {
                        Direction::Down
                    });
                }
                "StatementBegin" => {
                    if section.is_none() {
                        return Err(format!("line {}: StatementBegin outside of a section", line_no));
                    }
                    in_block = true;
                }
                "StatementEnd" => {
                    if !in_block {
                        return Err(format!("line {}: StatementEnd without StatementBegin", line_no));
                    }
                    in_block = false;
                    push_statement(section, &mut current, &mut up, &mut down);
                }
                other => return Err(format!("line {}: unknown marker '{}'", line_no, other)),
            }
            continue;
        }

        if !in_block && (trimmed.is_empty() || trimmed.starts_with("--")) {
            continue;
        }

        if section.is_none() {
            return Err(format!(
                "line {}: statement before the first '-- +migrate Up' or '-- +migrate Down'",
                line_no
            ));
        }

        current.push_str(line);
        current.push('\n');

        if !in_block && trimmed.ends_with(';') {
            push_statement(section, &mut current, &mut up, &mut down);
        }
    }

    if in_block {
        return Err("StatementBegin without StatementEnd".to_string());
    }
    if !current.trim().is_empty() {
        return Err("last statement not terminated with ';'".to_string());
    }

    Ok(Migration::new(id, up, down))
}

fn push_statement(
    section: Option<Direction>,
    current: &mut String,
    up: &mut Vec<String>,
    down: &mut Vec<String>,
) {
    let statement = std::mem::take(current).trim().to_string();
    if statement.is_empty() {
        return;
    }
    match section {
        Some(Direction::Up) => up.push(statement),
        Some(Direction::Down) => down.push(statement),
        None => {}
    }
}
