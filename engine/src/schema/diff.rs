use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::schema::infer::SourceField;
use crate::schema::mapper::FieldMapper;
use crate::types::{ColumnSpec, DdlStatement, SqlType, is_reserved_column};

/// One alteration needed to bring a Target table in line with the Source fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum SchemaChange {
    AddColumn {
        column_name: String,
        data_type: SqlType,
        source_field_name: String,
    },
    ModifyColumn {
        column_name: String,
        data_type: SqlType,
        previous_type: SqlType,
        source_field_name: String,
    },
    DropColumn {
        column_name: String,
    },
}

impl SchemaChange {
    pub fn column_name(&self) -> &str {
        match self {
            SchemaChange::AddColumn { column_name, .. }
            | SchemaChange::ModifyColumn { column_name, .. }
            | SchemaChange::DropColumn { column_name } => column_name,
        }
    }

    /// Returns the idempotent DDL statement that performs this change.
    pub fn to_ddl(&self) -> DdlStatement {
        match self {
            SchemaChange::AddColumn {
                column_name,
                data_type,
                ..
            } => DdlStatement::AddColumn {
                column: column_name.clone(),
                data_type: data_type.clone(),
            },
            SchemaChange::ModifyColumn {
                column_name,
                data_type,
                ..
            } => DdlStatement::AlterColumnType {
                column: column_name.clone(),
                data_type: data_type.clone(),
            },
            SchemaChange::DropColumn { column_name } => DdlStatement::DropColumn {
                column: column_name.clone(),
            },
        }
    }
}

/// Compares the Source fields of a table with the Target columns.
///
/// Emits `AddColumn` for fields without a column and `ModifyColumn` for columns whose type
/// differs from the inferred one. Never emits `DropColumn`: columns missing from the sample are
/// left alone. Reserved columns are skipped, and when two fields map to the same column the
/// first one wins.
pub fn diff(
    source_fields: &[SourceField],
    target_columns: &[ColumnSpec],
    mapper: &FieldMapper,
) -> Vec<SchemaChange> {
    let mut seen_columns = HashSet::new();
    let mut changes = Vec::new();

    for field in source_fields {
        let column_name = mapper.map_field_name(&field.name);
        if is_reserved_column(&column_name) || !seen_columns.insert(column_name.clone()) {
            continue;
        }

        if let Some(change) = change_for_field(field, column_name, target_columns) {
            changes.push(change);
        }
    }

    changes
}

/// Returns the change needed for the single column `column_name`, if any.
///
/// Used to re-derive a previously logged schema change from the current state.
pub fn diff_for_column(
    source_fields: &[SourceField],
    target_columns: &[ColumnSpec],
    mapper: &FieldMapper,
    column_name: &str,
) -> Option<SchemaChange> {
    diff(source_fields, target_columns, mapper)
        .into_iter()
        .find(|change| change.column_name() == column_name)
}

fn change_for_field(
    field: &SourceField,
    column_name: String,
    target_columns: &[ColumnSpec],
) -> Option<SchemaChange> {
    let expected_type = field.inferred_type.sql_type();

    let Some(existing) = target_columns.iter().find(|c| c.name == column_name) else {
        return Some(SchemaChange::AddColumn {
            column_name,
            data_type: expected_type,
            source_field_name: field.name.clone(),
        });
    };

    // Without a single non-null sample the type is a guess, which must not rewrite a column.
    if !field.sampled || existing.data_type == expected_type {
        return None;
    }

    Some(SchemaChange::ModifyColumn {
        column_name,
        data_type: expected_type,
        previous_type: existing.data_type.clone(),
        source_field_name: field.name.clone(),
    })
}
