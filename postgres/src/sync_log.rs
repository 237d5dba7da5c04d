use chrono::{DateTime, Utc};
use sqlx::{PgPool, Type, prelude::FromRow};

/// Kind of change recorded in the sync log.
#[derive(Debug, Clone, Copy, Type, PartialEq, Eq)]
#[sqlx(type_name = "sync.sync_type", rename_all = "snake_case")]
pub enum SyncType {
    Schema,
    Data,
}

/// Outcome of a sync log entry.
#[derive(Debug, Clone, Copy, Type, PartialEq, Eq)]
#[sqlx(type_name = "sync.sync_status", rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Failed,
    Pending,
}

/// A row from the sync.sync_log table.
#[derive(Debug, Clone, FromRow)]
pub struct SyncLogRow {
    pub id: i64,
    pub sync_type: SyncType,
    pub source_system: String,
    pub target_system: String,
    pub table_name: String,
    pub operation: String,
    pub operation_details: serde_json::Value,
    pub payload: serde_json::Value,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    pub attempt: i32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Values for a row about to be appended to sync.sync_log.
#[derive(Debug, Clone)]
pub struct NewSyncLogRow {
    pub sync_type: SyncType,
    pub source_system: String,
    pub target_system: String,
    pub table_name: String,
    pub operation: String,
    pub operation_details: serde_json::Value,
    pub payload: serde_json::Value,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    pub attempt: i32,
}

const SELECT_COLUMNS: &str = r#"
    select id, sync_type, source_system, target_system, table_name, operation,
           operation_details, payload, status, error_message, attempt, created_at, completed_at
    from sync.sync_log
"#;

/// Appends a row and returns it as stored.
///
/// Terminal statuses get `completed_at` stamped on insert.
pub async fn insert_sync_log_row(pool: &PgPool, row: NewSyncLogRow) -> sqlx::Result<SyncLogRow> {
    sqlx::query_as::<_, SyncLogRow>(
        r#"
        insert into sync.sync_log (
            sync_type, source_system, target_system, table_name, operation,
            operation_details, payload, status, error_message, attempt, completed_at
        )
        values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                case when $8 = 'pending'::sync.sync_status then null else now() end)
        returning id, sync_type, source_system, target_system, table_name, operation,
                  operation_details, payload, status, error_message, attempt,
                  created_at, completed_at
        "#,
    )
    .bind(row.sync_type)
    .bind(row.source_system)
    .bind(row.target_system)
    .bind(row.table_name)
    .bind(row.operation)
    .bind(row.operation_details)
    .bind(row.payload)
    .bind(row.status)
    .bind(row.error_message)
    .bind(row.attempt)
    .fetch_one(pool)
    .await
}

/// Returns pending rows oldest first.
pub async fn get_pending_sync_log_rows(
    pool: &PgPool,
    limit: i64,
) -> sqlx::Result<Vec<SyncLogRow>> {
    let sql = format!(
        "{SELECT_COLUMNS} where status = 'pending'::sync.sync_status \
         and completed_at is null order by id limit $1"
    );

    sqlx::query_as::<_, SyncLogRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// Returns failed rows, most recent first.
pub async fn get_failed_sync_log_rows(pool: &PgPool, limit: i64) -> sqlx::Result<Vec<SyncLogRow>> {
    let sql = format!(
        "{SELECT_COLUMNS} where status = 'failed'::sync.sync_status order by id desc limit $1"
    );

    sqlx::query_as::<_, SyncLogRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await
}

pub async fn get_sync_log_row(pool: &PgPool, id: i64) -> sqlx::Result<Option<SyncLogRow>> {
    let sql = format!("{SELECT_COLUMNS} where id = $1");

    sqlx::query_as::<_, SyncLogRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Completes a still-open row.
///
/// Returns `None` when no open row with `id` exists, either because it was never written or
/// because it has already been completed.
pub async fn complete_sync_log_row(
    pool: &PgPool,
    id: i64,
    status: SyncStatus,
    error_message: Option<&str>,
) -> sqlx::Result<Option<SyncLogRow>> {
    sqlx::query_as::<_, SyncLogRow>(
        r#"
        update sync.sync_log
        set status = $2, error_message = $3, completed_at = now()
        where id = $1 and completed_at is null
        returning id, sync_type, source_system, target_system, table_name, operation,
                  operation_details, payload, status, error_message, attempt,
                  created_at, completed_at
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(error_message)
    .fetch_optional(pool)
    .await
}
