//! Postgres building blocks for the sync engine.
//!
//! This crate owns everything that speaks SQL to the target database: type names, identifier
//! quoting, DDL rendering, catalog introspection, row writes and the sync log table.

pub mod db;
pub mod ddl;
pub mod rows;
pub mod schema;
pub mod sync_log;
pub mod types;
