use ::postgres::types::TableName;
use ::postgres::{rows, schema};
use sqlx::PgPool;
use tracing::debug;

use crate::error::SyncResult;
use crate::store::{RelationalStore, RowPayload, payload_to_json};
use crate::types::{ColumnSpec, DdlStatement};

/// [`RelationalStore`] backed by a Postgres database.
///
/// Synchronized tables live in a single schema, `public` unless configured otherwise.
#[derive(Debug, Clone)]
pub struct PgRelationalStore {
    pool: PgPool,
    schema: String,
}

impl PgRelationalStore {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    fn table_name(&self, table: &str) -> TableName {
        TableName::new(self.schema.clone(), table)
    }
}

impl RelationalStore for PgRelationalStore {
    fn name() -> &'static str {
        "postgres"
    }

    async fn get_columns(&self, table: &str) -> SyncResult<Vec<ColumnSpec>> {
        let columns = schema::get_table_columns(&self.pool, &self.table_name(table)).await?;

        Ok(columns)
    }

    async fn exec_ddl(&self, table: &str, statement: &DdlStatement) -> SyncResult<()> {
        let table_name = self.table_name(table);
        debug!(table = %table_name, sql = %statement.to_sql(&table_name), "executing ddl");

        schema::execute_ddl(&self.pool, &table_name, statement).await?;

        Ok(())
    }

    async fn find_row_by_identity(
        &self,
        table: &str,
        id_column: &str,
        id_value: &str,
    ) -> SyncResult<bool> {
        let exists =
            rows::row_exists(&self.pool, &self.table_name(table), id_column, id_value).await?;

        Ok(exists)
    }

    async fn insert_row(&self, table: &str, payload: &RowPayload) -> SyncResult<()> {
        rows::insert_row(&self.pool, &self.table_name(table), &payload_to_json(payload)).await?;

        Ok(())
    }

    async fn update_row(
        &self,
        table: &str,
        id_column: &str,
        id_value: &str,
        payload: &RowPayload,
    ) -> SyncResult<()> {
        let updated = rows::update_row(
            &self.pool,
            &self.table_name(table),
            id_column,
            id_value,
            &payload_to_json(payload),
        )
        .await?;

        if updated == 0 {
            debug!(table, id_value, "update matched no row");
        }

        Ok(())
    }
}
