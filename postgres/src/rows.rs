use pg_escape::quote_identifier;
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::ddl::UPDATED_AT_COLUMN;
use crate::types::TableName;

/// Returns whether a row with `id_column = id_value` exists in `table`.
pub async fn row_exists(
    pool: &PgPool,
    table: &TableName,
    id_column: &str,
    id_value: &str,
) -> sqlx::Result<bool> {
    let sql = format!(
        "select exists(select 1 from {} where {} = $1)",
        table.as_quoted_identifier(),
        quote_identifier(id_column)
    );

    sqlx::query_scalar(&sql).bind(id_value).fetch_one(pool).await
}

/// Inserts `payload` as a new row of `table`.
///
/// Values are bound as a single `jsonb` document and coerced to the column types by
/// `jsonb_populate_record`, so the statement works for any column layout.
pub async fn insert_row(
    pool: &PgPool,
    table: &TableName,
    payload: &Map<String, Value>,
) -> sqlx::Result<u64> {
    let sql = insert_row_sql(table, payload);

    let result = sqlx::query(&sql)
        .bind(Value::Object(payload.clone()))
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Updates the row of `table` identified by `id_column = id_value` with `payload`.
///
/// `updated_at` is always refreshed. Returns the number of rows touched.
pub async fn update_row(
    pool: &PgPool,
    table: &TableName,
    id_column: &str,
    id_value: &str,
    payload: &Map<String, Value>,
) -> sqlx::Result<u64> {
    let sql = update_row_sql(table, id_column, payload);

    let result = sqlx::query(&sql)
        .bind(Value::Object(payload.clone()))
        .bind(id_value)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

fn quoted_columns(payload: &Map<String, Value>) -> Vec<String> {
    payload.keys().map(|column| quote_identifier(column).into_owned()).collect()
}

fn insert_row_sql(table: &TableName, payload: &Map<String, Value>) -> String {
    let table = table.as_quoted_identifier();
    let columns = quoted_columns(payload).join(", ");

    format!(
        "insert into {table} ({columns}) \
         select {columns} from jsonb_populate_record(null::{table}, $1)"
    )
}

fn update_row_sql(table: &TableName, id_column: &str, payload: &Map<String, Value>) -> String {
    let table = table.as_quoted_identifier();
    let id_column = quote_identifier(id_column);
    let updated_at = quote_identifier(UPDATED_AT_COLUMN);

    let columns = quoted_columns(payload);
    let selected = columns
        .iter()
        .map(|column| format!("r.{column}"))
        .collect::<Vec<_>>();

    let mut targets = columns;
    targets.push(updated_at.into_owned());

    let mut values = selected;
    values.push("now()".to_string());

    format!(
        "update {table} set ({}) = \
         (select {} from jsonb_populate_record(null::{table}, $1) r) \
         where {id_column} = $2",
        targets.join(", "),
        values.join(", ")
    )
}
