use ::postgres::sync_log::{self, NewSyncLogRow, SyncLogRow};
use sqlx::PgPool;

use crate::bail;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::log::{NewSyncLogEntry, SyncLog, SyncLogEntry, SyncOperation, SyncStatus, SyncType};

impl From<SyncType> for sync_log::SyncType {
    fn from(value: SyncType) -> Self {
        match value {
            SyncType::Schema => sync_log::SyncType::Schema,
            SyncType::Data => sync_log::SyncType::Data,
        }
    }
}

impl From<sync_log::SyncType> for SyncType {
    fn from(value: sync_log::SyncType) -> Self {
        match value {
            sync_log::SyncType::Schema => SyncType::Schema,
            sync_log::SyncType::Data => SyncType::Data,
        }
    }
}

impl From<SyncStatus> for sync_log::SyncStatus {
    fn from(value: SyncStatus) -> Self {
        match value {
            SyncStatus::Success => sync_log::SyncStatus::Success,
            SyncStatus::Failed => sync_log::SyncStatus::Failed,
            SyncStatus::Pending => sync_log::SyncStatus::Pending,
        }
    }
}

impl From<sync_log::SyncStatus> for SyncStatus {
    fn from(value: sync_log::SyncStatus) -> Self {
        match value {
            sync_log::SyncStatus::Success => SyncStatus::Success,
            sync_log::SyncStatus::Failed => SyncStatus::Failed,
            sync_log::SyncStatus::Pending => SyncStatus::Pending,
        }
    }
}

impl TryFrom<SyncLogRow> for SyncLogEntry {
    type Error = SyncError;

    fn try_from(row: SyncLogRow) -> Result<Self, Self::Error> {
        let operation: SyncOperation = serde_json::from_value(row.operation_details)?;
        let attempt = u32::try_from(row.attempt).unwrap_or_default();

        Ok(SyncLogEntry {
            id: row.id,
            sync_type: row.sync_type.into(),
            source_system: row.source_system,
            target_system: row.target_system,
            table_name: row.table_name,
            operation,
            payload: row.payload,
            status: row.status.into(),
            error_message: row.error_message,
            attempt,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

/// [`SyncLog`] stored in the `sync.sync_log` table of the target database.
///
/// The table and its enum types are created by the syncer's migrations.
#[derive(Debug, Clone)]
pub struct PostgresSyncLog {
    pool: PgPool,
}

impl PostgresSyncLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_rows(rows: Vec<SyncLogRow>) -> SyncResult<Vec<SyncLogEntry>> {
    rows.into_iter().map(SyncLogEntry::try_from).collect()
}

fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

impl SyncLog for PostgresSyncLog {
    async fn record(&self, entry: NewSyncLogEntry) -> SyncResult<i64> {
        let row = NewSyncLogRow {
            sync_type: entry.operation.sync_type().into(),
            source_system: entry.source_system,
            target_system: entry.target_system,
            table_name: entry.table_name,
            operation: entry.operation.name().to_string(),
            operation_details: serde_json::to_value(&entry.operation)?,
            payload: entry.payload,
            status: entry.status.into(),
            error_message: entry.error_message,
            attempt: i32::try_from(entry.attempt).unwrap_or(i32::MAX),
        };

        let stored = sync_log::insert_sync_log_row(&self.pool, row).await?;

        Ok(stored.id)
    }

    async fn query_pending(&self, limit: usize) -> SyncResult<Vec<SyncLogEntry>> {
        let rows = sync_log::get_pending_sync_log_rows(&self.pool, to_limit(limit)).await?;

        to_rows(rows)
    }

    async fn query_failed(&self, limit: usize) -> SyncResult<Vec<SyncLogEntry>> {
        let rows = sync_log::get_failed_sync_log_rows(&self.pool, to_limit(limit)).await?;

        to_rows(rows)
    }

    async fn entry(&self, id: i64) -> SyncResult<Option<SyncLogEntry>> {
        let row = sync_log::get_sync_log_row(&self.pool, id).await?;

        row.map(SyncLogEntry::try_from).transpose()
    }

    async fn mark_completed(
        &self,
        id: i64,
        status: SyncStatus,
        error_message: Option<String>,
    ) -> SyncResult<()> {
        if !status.is_terminal() {
            bail!(
                ErrorKind::InvalidState,
                "A sync log entry cannot be completed as pending",
                format!("entry {id}")
            );
        }

        let completed = sync_log::complete_sync_log_row(
            &self.pool,
            id,
            status.into(),
            error_message.as_deref(),
        )
        .await?;

        if completed.is_none() {
            bail!(
                ErrorKind::InvalidState,
                "Sync log entry is missing or already completed",
                format!("entry {id}")
            );
        }

        Ok(())
    }
}
