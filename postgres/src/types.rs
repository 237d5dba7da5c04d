use std::fmt;

use pg_escape::quote_identifier;
use serde::{Deserialize, Serialize};

/// Physical column type on the target.
///
/// The engine only ever creates the five named variants. Any other type found while
/// introspecting an existing table is kept verbatim in [`SqlType::Other`] so that it can be
/// compared and reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SqlType {
    Text,
    Numeric,
    Boolean,
    Timestamptz,
    Jsonb,
    Other(String),
}

impl SqlType {
    /// Parses a type name as rendered by `format_type` or written in DDL.
    pub fn from_catalog_name(name: &str) -> SqlType {
        match name.trim().to_lowercase().as_str() {
            "text" => SqlType::Text,
            "numeric" | "decimal" => SqlType::Numeric,
            "boolean" | "bool" => SqlType::Boolean,
            "timestamptz" | "timestamp with time zone" => SqlType::Timestamptz,
            "jsonb" => SqlType::Jsonb,
            other => SqlType::Other(other.to_string()),
        }
    }

    /// Returns the name used when rendering DDL.
    pub fn as_sql(&self) -> &str {
        match self {
            SqlType::Text => "text",
            SqlType::Numeric => "numeric",
            SqlType::Boolean => "boolean",
            SqlType::Timestamptz => "timestamptz",
            SqlType::Jsonb => "jsonb",
            SqlType::Other(name) => name,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl From<String> for SqlType {
    fn from(value: String) -> Self {
        SqlType::from_catalog_name(&value)
    }
}

impl From<SqlType> for String {
    fn from(value: SqlType) -> Self {
        value.as_sql().to_string()
    }
}

/// A column as it physically exists on a target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: SqlType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: SqlType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Schema-qualified name of a target table.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub schema: String,
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> TableName {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Returns `"schema"."name"` with both parts escaped.
    pub fn as_quoted_identifier(&self) -> String {
        let quoted_schema = quote_identifier(&self.schema);
        let quoted_name = quote_identifier(&self.name);

        format!("{quoted_schema}.{quoted_name}")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}
