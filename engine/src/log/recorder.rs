use tracing::{error, warn};

use crate::error::SyncError;
use crate::log::{NewSyncLogEntry, SyncLog, SyncLogEntry, SyncOperation, SyncStatus};
use crate::policy::{RetryDirective, build_error_handling_policy};

/// Outcome of logging a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureRecord {
    /// Id of the failed entry, if it could be written.
    pub failed_entry_id: Option<i64>,
    /// Id of the pending entry queued for a retry, if any.
    pub retry_entry_id: Option<i64>,
}

/// Writes operation outcomes to a [`SyncLog`].
///
/// Log write failures are reported through tracing and never interrupt a sync pass.
#[derive(Debug, Clone)]
pub struct LogRecorder<L> {
    log: L,
    source_system: String,
    target_system: String,
    max_retry_attempts: u32,
}

impl<L> LogRecorder<L>
where
    L: SyncLog,
{
    pub fn new(
        log: L,
        source_system: impl Into<String>,
        target_system: impl Into<String>,
        max_retry_attempts: u32,
    ) -> Self {
        Self {
            log,
            source_system: source_system.into(),
            target_system: target_system.into(),
            max_retry_attempts,
        }
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    fn entry(
        &self,
        table: &str,
        operation: SyncOperation,
        payload: serde_json::Value,
        status: SyncStatus,
        error_message: Option<String>,
        attempt: u32,
    ) -> NewSyncLogEntry {
        NewSyncLogEntry {
            source_system: self.source_system.clone(),
            target_system: self.target_system.clone(),
            table_name: table.to_string(),
            operation,
            payload,
            status,
            error_message,
            attempt,
        }
    }

    async fn append(&self, entry: NewSyncLogEntry) -> Option<i64> {
        let table = entry.table_name.clone();
        let operation = entry.operation.name();

        match self.log.record(entry).await {
            Ok(id) => Some(id),
            Err(err) => {
                error!(table, operation, error = %err, "failed to write sync log entry");
                None
            }
        }
    }

    /// Records a successful operation.
    pub async fn record_success(
        &self,
        table: &str,
        operation: SyncOperation,
        payload: serde_json::Value,
        attempt: u32,
    ) -> Option<i64> {
        let entry = self.entry(table, operation, payload, SyncStatus::Success, None, attempt);
        self.append(entry).await
    }

    /// Records a failed operation and queues a retry when the error is transient.
    ///
    /// A retry is queued only for [`RetryDirective::Timed`] errors while `attempt` is below the
    /// configured maximum.
    pub async fn record_failure(
        &self,
        table: &str,
        operation: SyncOperation,
        payload: serde_json::Value,
        attempt: u32,
        err: &SyncError,
    ) -> FailureRecord {
        let policy = build_error_handling_policy(err);
        warn!(
            table,
            operation = operation.name(),
            attempt,
            error = %err.log_message(),
            solution = policy.solution().unwrap_or_default(),
            "sync operation failed"
        );

        let failed = self.entry(
            table,
            operation.clone(),
            payload.clone(),
            SyncStatus::Failed,
            Some(err.log_message()),
            attempt,
        );
        let failed_entry_id = self.append(failed).await;

        let retry_entry_id = if policy.retry_directive() == RetryDirective::Timed
            && attempt < self.max_retry_attempts
        {
            let pending = self.entry(
                table,
                operation,
                payload,
                SyncStatus::Pending,
                None,
                attempt + 1,
            );
            self.append(pending).await
        } else {
            None
        };

        FailureRecord {
            failed_entry_id,
            retry_entry_id,
        }
    }

    /// Queues `operation` for the next pending pass without recording a failure.
    ///
    /// Used when an operation succeeded only in part and has to be completed later.
    pub async fn queue_retry(
        &self,
        table: &str,
        operation: SyncOperation,
        payload: serde_json::Value,
    ) -> Option<i64> {
        let pending = self.entry(table, operation, payload, SyncStatus::Pending, None, 1);
        self.append(pending).await
    }

    /// Closes a pending entry after it has been re-attempted.
    pub async fn complete(&self, id: i64, status: SyncStatus, error_message: Option<String>) {
        if let Err(err) = self.log.mark_completed(id, status, error_message).await {
            error!(entry_id = id, error = %err, "failed to complete sync log entry");
        }
    }

    /// Closes a pending entry whose re-attempt failed and queues the next attempt when the
    /// error is transient. Returns the id of the new pending entry, if any.
    pub async fn complete_failed_attempt(
        &self,
        entry: &SyncLogEntry,
        err: &SyncError,
    ) -> Option<i64> {
        let policy = build_error_handling_policy(err);
        warn!(
            table = %entry.table_name,
            entry_id = entry.id,
            operation = entry.operation.name(),
            attempt = entry.attempt,
            error = %err.log_message(),
            solution = policy.solution().unwrap_or_default(),
            "pending sync operation failed again"
        );

        self.complete(entry.id, SyncStatus::Failed, Some(err.log_message()))
            .await;

        if policy.retry_directive() != RetryDirective::Timed
            || entry.attempt >= self.max_retry_attempts
        {
            return None;
        }

        let pending = self.entry(
            &entry.table_name,
            entry.operation.clone(),
            entry.payload.clone(),
            SyncStatus::Pending,
            None,
            entry.attempt + 1,
        );
        self.append(pending).await
    }
}
