use pg_escape::quote_identifier;
use serde::{Deserialize, Serialize};

use crate::types::{SqlType, TableName};

/// Surrogate primary key of every synchronized table.
pub const ID_COLUMN: &str = "id";

/// Column holding the source record identifier, unique per table.
pub const IDENTITY_COLUMN: &str = "source_id";

pub const CREATED_AT_COLUMN: &str = "created_at";

pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Columns managed by the engine itself. Source fields never write to them.
pub const RESERVED_COLUMNS: &[&str] = &[
    ID_COLUMN,
    IDENTITY_COLUMN,
    CREATED_AT_COLUMN,
    UPDATED_AT_COLUMN,
];

/// Returns `true` if `column` is managed by the engine.
pub fn is_reserved_column(column: &str) -> bool {
    RESERVED_COLUMNS.contains(&column)
}

/// A single idempotent schema statement against one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "statement", rename_all = "snake_case")]
pub enum DdlStatement {
    /// Creates the table with its bookkeeping columns if it does not exist yet.
    CreateTable,
    AddColumn { column: String, data_type: SqlType },
    /// Changes the type of a column with a blind `using column::type` cast.
    AlterColumnType { column: String, data_type: SqlType },
    DropColumn { column: String },
}

impl DdlStatement {
    /// Renders the statement for `table`.
    pub fn to_sql(&self, table: &TableName) -> String {
        let table = table.as_quoted_identifier();

        match self {
            DdlStatement::CreateTable => format!(
                "create table if not exists {table} (\
                 {id} bigserial primary key, \
                 {identity} text not null unique, \
                 {created_at} timestamptz not null default now(), \
                 {updated_at} timestamptz not null default now())",
                id = quote_identifier(ID_COLUMN),
                identity = quote_identifier(IDENTITY_COLUMN),
                created_at = quote_identifier(CREATED_AT_COLUMN),
                updated_at = quote_identifier(UPDATED_AT_COLUMN),
            ),
            DdlStatement::AddColumn { column, data_type } => format!(
                "alter table {table} add column if not exists {} {data_type}",
                quote_identifier(column)
            ),
            DdlStatement::AlterColumnType { column, data_type } => {
                let column = quote_identifier(column);
                format!(
                    "alter table {table} alter column {column} \
                     type {data_type} using {column}::{data_type}"
                )
            }
            DdlStatement::DropColumn { column } => format!(
                "alter table {table} drop column if exists {}",
                quote_identifier(column)
            ),
        }
    }
}
