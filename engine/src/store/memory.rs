use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::schema::infer::is_timestamp;
use crate::store::{RelationalStore, RowPayload};
use crate::types::{ColumnSpec, DdlStatement, IDENTITY_COLUMN, SqlType, Value};

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<ColumnSpec>,
    rows: Vec<RowPayload>,
}

impl MemoryTable {
    fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.name == name)
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<String, MemoryTable>,
    executed_ddl: Vec<(String, DdlStatement)>,
    next_row_id: i64,
    row_writes: usize,
}

/// In-memory relational store for tests and local development.
///
/// It behaves like the Postgres store where the engine can observe it: writes to unknown
/// columns fail, `source_id` is unique, values must be castable to their column type, and type
/// changes fail when an existing value cannot be cast.
#[derive(Debug, Clone, Default)]
pub struct MemoryRelationalStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the rows of `table`.
    pub async fn rows(&self, table: &str) -> Vec<RowPayload> {
        let inner = self.inner.lock().await;

        inner
            .tables
            .get(table)
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    }

    /// Returns the row of `table` with the given source id.
    pub async fn row(&self, table: &str, source_id: &str) -> Option<RowPayload> {
        self.rows(table)
            .await
            .into_iter()
            .find(|row| row.get(IDENTITY_COLUMN).and_then(Value::as_str) == Some(source_id))
    }

    /// Returns every DDL statement executed so far, with the table it ran against.
    pub async fn executed_ddl(&self) -> Vec<(String, DdlStatement)> {
        let inner = self.inner.lock().await;
        inner.executed_ddl.clone()
    }

    /// Returns the number of successful inserts and updates.
    pub async fn row_writes(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.row_writes
    }
}

/// Returns whether `value` can be stored in a column of `data_type`.
fn value_fits(value: &Value, data_type: &SqlType) -> bool {
    match (data_type, value) {
        (_, Value::Null) => true,
        (SqlType::Text | SqlType::Other(_), _) => true,
        (SqlType::Numeric, Value::Number(_)) => true,
        (SqlType::Numeric, Value::String(value)) => value.trim().parse::<f64>().is_ok(),
        (SqlType::Boolean, Value::Bool(_)) => true,
        (SqlType::Boolean, Value::String(value)) => matches!(
            value.trim().to_lowercase().as_str(),
            "true" | "false" | "t" | "f" | "yes" | "no" | "on" | "off" | "1" | "0"
        ),
        (SqlType::Timestamptz, Value::String(value)) => is_timestamp(value.trim()),
        (SqlType::Jsonb, Value::String(value)) => {
            serde_json::from_str::<serde_json::Value>(value).is_ok()
        }
        (SqlType::Jsonb, _) => true,
        _ => false,
    }
}

fn check_payload(table_name: &str, table: &MemoryTable, payload: &RowPayload) -> SyncResult<()> {
    for (column, value) in payload {
        let Some(spec) = table.column(column) else {
            bail!(
                ErrorKind::TargetSchemaError,
                "Column does not exist",
                format!("column '{column}' of table '{table_name}' does not exist")
            );
        };

        if !value_fits(value, &spec.data_type) {
            bail!(
                ErrorKind::IncompatibleColumnType,
                "Value cannot be cast to the column type",
                format!("column '{column}' of type {} rejected {value:?}", spec.data_type)
            );
        }
    }

    Ok(())
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

impl RelationalStore for MemoryRelationalStore {
    fn name() -> &'static str {
        "memory"
    }

    async fn get_columns(&self, table: &str) -> SyncResult<Vec<ColumnSpec>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .tables
            .get(table)
            .map(|table| table.columns.clone())
            .unwrap_or_default())
    }

    async fn exec_ddl(&self, table: &str, statement: &DdlStatement) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        if let DdlStatement::CreateTable = statement {
            inner
                .tables
                .entry(table.to_string())
                .or_insert_with(|| MemoryTable {
                    columns: vec![
                        ColumnSpec::new("id", SqlType::Other("bigint".to_string())),
                        ColumnSpec::new(IDENTITY_COLUMN, SqlType::Text),
                        ColumnSpec::new("created_at", SqlType::Timestamptz),
                        ColumnSpec::new("updated_at", SqlType::Timestamptz),
                    ],
                    rows: Vec::new(),
                });
            inner.executed_ddl.push((table.to_string(), statement.clone()));

            return Ok(());
        }

        let Some(memory_table) = inner.tables.get_mut(table) else {
            bail!(
                ErrorKind::TargetSchemaError,
                "Table does not exist",
                format!("relation '{table}' does not exist")
            );
        };

        match statement {
            DdlStatement::CreateTable => {}
            DdlStatement::AddColumn { column, data_type } => {
                if memory_table.column(column).is_none() {
                    memory_table
                        .columns
                        .push(ColumnSpec::new(column.clone(), data_type.clone()));
                }
            }
            DdlStatement::AlterColumnType { column, data_type } => {
                let Some(index) = memory_table.columns.iter().position(|c| &c.name == column)
                else {
                    bail!(
                        ErrorKind::TargetSchemaError,
                        "Column does not exist",
                        format!("column '{column}' of table '{table}' does not exist")
                    );
                };

                let incompatible = memory_table.rows.iter().find_map(|row| {
                    row.get(column)
                        .filter(|value| !value_fits(value, data_type))
                        .cloned()
                });
                if let Some(value) = incompatible {
                    bail!(
                        ErrorKind::IncompatibleColumnType,
                        "Existing values cannot be cast to the new column type",
                        format!("cannot cast {value:?} in column '{column}' to {data_type}")
                    );
                }

                memory_table.columns[index].data_type = data_type.clone();
            }
            DdlStatement::DropColumn { column } => {
                memory_table.columns.retain(|c| &c.name != column);
                for row in &mut memory_table.rows {
                    row.remove(column);
                }
            }
        }

        inner.executed_ddl.push((table.to_string(), statement.clone()));

        Ok(())
    }

    async fn find_row_by_identity(
        &self,
        table: &str,
        id_column: &str,
        id_value: &str,
    ) -> SyncResult<bool> {
        let inner = self.inner.lock().await;

        let Some(memory_table) = inner.tables.get(table) else {
            bail!(
                ErrorKind::TargetSchemaError,
                "Table does not exist",
                format!("relation '{table}' does not exist")
            );
        };

        Ok(memory_table
            .rows
            .iter()
            .any(|row| row.get(id_column).and_then(Value::as_str) == Some(id_value)))
    }

    async fn insert_row(&self, table: &str, payload: &RowPayload) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.next_row_id += 1;
        let row_id = inner.next_row_id;

        let Some(memory_table) = inner.tables.get_mut(table) else {
            bail!(
                ErrorKind::TargetSchemaError,
                "Table does not exist",
                format!("relation '{table}' does not exist")
            );
        };

        check_payload(table, memory_table, payload)?;

        let source_id = payload.get(IDENTITY_COLUMN).and_then(Value::as_str);
        let Some(source_id) = source_id else {
            bail!(
                ErrorKind::ConstraintViolation,
                "Identity column must not be null",
                format!("insert into '{table}' has no {IDENTITY_COLUMN}")
            );
        };
        let duplicate = memory_table
            .rows
            .iter()
            .any(|row| row.get(IDENTITY_COLUMN).and_then(Value::as_str) == Some(source_id));
        if duplicate {
            bail!(
                ErrorKind::ConstraintViolation,
                "Duplicate identity value",
                format!("{IDENTITY_COLUMN} '{source_id}' already exists in '{table}'")
            );
        }

        let mut row = payload.clone();
        row.insert("id".to_string(), Value::from(row_id));
        row.insert("created_at".to_string(), now());
        row.insert("updated_at".to_string(), now());
        memory_table.rows.push(row);

        inner.row_writes += 1;

        Ok(())
    }

    async fn update_row(
        &self,
        table: &str,
        id_column: &str,
        id_value: &str,
        payload: &RowPayload,
    ) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        let Some(memory_table) = inner.tables.get_mut(table) else {
            bail!(
                ErrorKind::TargetSchemaError,
                "Table does not exist",
                format!("relation '{table}' does not exist")
            );
        };

        check_payload(table, memory_table, payload)?;

        let Some(row) = memory_table
            .rows
            .iter_mut()
            .find(|row| row.get(id_column).and_then(Value::as_str) == Some(id_value))
        else {
            return Ok(());
        };

        row.extend(payload.iter().map(|(k, v)| (k.clone(), v.clone())));
        row.insert("updated_at".to_string(), now());

        inner.row_writes += 1;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(entries: &[(&str, Value)]) -> RowPayload {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    async fn store_with_table() -> MemoryRelationalStore {
        let store = MemoryRelationalStore::new();
        store.exec_ddl("artists", &DdlStatement::CreateTable).await.unwrap();
        store
            .exec_ddl(
                "artists",
                &DdlStatement::AddColumn {
                    column: "year".to_string(),
                    data_type: SqlType::Text,
                },
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn unknown_columns_are_rejected() {
        let store = store_with_table().await;

        let err = store
            .insert_row(
                "artists",
                &payload(&[("source_id", "rec_1".into()), ("nope", "x".into())]),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TargetSchemaError);
    }

    #[tokio::test]
    async fn identity_is_unique() {
        let store = store_with_table().await;
        let row = payload(&[("source_id", "rec_1".into())]);

        store.insert_row("artists", &row).await.unwrap();
        let err = store.insert_row("artists", &row).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert_eq!(store.rows("artists").await.len(), 1);
    }

    #[tokio::test]
    async fn type_change_fails_on_uncastable_data() {
        let store = store_with_table().await;
        store
            .insert_row(
                "artists",
                &payload(&[("source_id", "rec_1".into()), ("year", "circa 1970".into())]),
            )
            .await
            .unwrap();

        let err = store
            .exec_ddl(
                "artists",
                &DdlStatement::AlterColumnType {
                    column: "year".to_string(),
                    data_type: SqlType::Numeric,
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::IncompatibleColumnType);
        let columns = store.get_columns("artists").await.unwrap();
        assert!(columns.contains(&ColumnSpec::new("year", SqlType::Text)));
    }

    #[tokio::test]
    async fn update_overwrites_given_columns() {
        let store = store_with_table().await;
        store
            .insert_row(
                "artists",
                &payload(&[("source_id", "rec_1".into()), ("year", "1970".into())]),
            )
            .await
            .unwrap();

        store
            .update_row("artists", "source_id", "rec_1", &payload(&[("year", "1971".into())]))
            .await
            .unwrap();

        let row = store.row("artists", "rec_1").await.unwrap();
        assert_eq!(row["year"], Value::from("1971"));
        assert_eq!(store.row_writes().await, 2);
    }
}
