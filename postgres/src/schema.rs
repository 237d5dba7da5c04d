use sqlx::{Executor, PgPool};
use tracing::debug;

use crate::ddl::DdlStatement;
use crate::types::{ColumnSpec, SqlType, TableName};

/// Returns the live columns of `table` in ordinal order.
///
/// A table that does not exist yields no columns.
pub async fn get_table_columns(pool: &PgPool, table: &TableName) -> sqlx::Result<Vec<ColumnSpec>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        select a.attname::text, format_type(a.atttypid, a.atttypmod)
        from pg_catalog.pg_attribute a
        join pg_catalog.pg_class c on c.oid = a.attrelid
        join pg_catalog.pg_namespace n on n.oid = c.relnamespace
        where n.nspname = $1 and c.relname = $2 and a.attnum > 0 and not a.attisdropped
        order by a.attnum
        "#,
    )
    .bind(&table.schema)
    .bind(&table.name)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(name, data_type)| ColumnSpec::new(name, SqlType::from_catalog_name(&data_type)))
        .collect())
}

/// Executes `statement` against `table` in its own implicit transaction.
pub async fn execute_ddl(
    pool: &PgPool,
    table: &TableName,
    statement: &DdlStatement,
) -> sqlx::Result<()> {
    let sql = statement.to_sql(table);
    debug!(%sql, "executing ddl statement");

    pool.execute(sql.as_str()).await?;

    Ok(())
}
