//! Storage test suite.
//!
//! Runs migrations and dungeon operations against a throwaway SQLite file per
//! test, so no database server is needed.
//!
//! Run with: cargo test --test store

mod test_helpers;

mod test_install;
mod test_migrations;
