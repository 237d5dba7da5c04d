use std::future::Future;

use crate::error::SyncResult;
use crate::log::{NewSyncLogEntry, SyncLogEntry, SyncStatus};

/// Trait for the durable, append-only history of sync operations.
///
/// Entries are never deleted. The only mutation allowed is the single completion transition of a
/// pending entry through [`SyncLog::mark_completed`].
pub trait SyncLog {
    /// Appends `entry` and returns its id.
    ///
    /// Entries recorded with a terminal status are completed on insert.
    fn record(&self, entry: NewSyncLogEntry) -> impl Future<Output = SyncResult<i64>> + Send;

    /// Returns up to `limit` open pending entries, oldest first.
    fn query_pending(
        &self,
        limit: usize,
    ) -> impl Future<Output = SyncResult<Vec<SyncLogEntry>>> + Send;

    /// Returns up to `limit` failed entries, most recent first.
    fn query_failed(
        &self,
        limit: usize,
    ) -> impl Future<Output = SyncResult<Vec<SyncLogEntry>>> + Send;

    /// Returns the entry with `id`, if any.
    fn entry(&self, id: i64) -> impl Future<Output = SyncResult<Option<SyncLogEntry>>> + Send;

    /// Completes the open entry `id` with a terminal `status`.
    ///
    /// Fails with [`crate::error::ErrorKind::InvalidState`] if the entry does not exist, is
    /// already completed, or `status` is [`SyncStatus::Pending`].
    fn mark_completed(
        &self,
        id: i64,
        status: SyncStatus,
        error_message: Option<String>,
    ) -> impl Future<Output = SyncResult<()>> + Send;
}
