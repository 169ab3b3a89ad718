//! Operations behind the command line: migrations and dungeon content.

pub mod dungeons;
pub mod migrations;

pub use migrations::{MigrationOutcome, RunMode, StatusReport};
