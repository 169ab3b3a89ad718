//! EVEmu database tool library.
//!
//! Schema migrations with a ledger, the base dataset install, the market seed
//! and import/export of dungeon content.

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod migration;
pub mod models;
pub mod services;
