//! Data types flowing through the sync engine.
//!
//! [`Value`] models a single Source field value, [`SyncRecord`] a Source row together with its
//! stable identifier. Target-side schema types are re-exported from the `postgres` crate.

mod record;
mod value;

pub use record::*;
pub use value::*;

// Re-exports.
pub use postgres::ddl::{DdlStatement, IDENTITY_COLUMN, RESERVED_COLUMNS, is_reserved_column};
pub use postgres::types::{ColumnSpec, SqlType, TableName};
