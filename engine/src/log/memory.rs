use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::log::{NewSyncLogEntry, SyncLog, SyncLogEntry, SyncStatus};

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<SyncLogEntry>,
}

/// In-memory sync log for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct MemorySyncLog {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySyncLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every entry in insertion order.
    pub async fn entries(&self) -> Vec<SyncLogEntry> {
        let inner = self.inner.lock().await;
        inner.entries.clone()
    }
}

impl SyncLog for MemorySyncLog {
    async fn record(&self, entry: NewSyncLogEntry) -> SyncResult<i64> {
        let mut inner = self.inner.lock().await;

        let id = inner.entries.len() as i64 + 1;
        let created_at = Utc::now();
        inner.entries.push(SyncLogEntry {
            id,
            sync_type: entry.operation.sync_type(),
            source_system: entry.source_system,
            target_system: entry.target_system,
            table_name: entry.table_name,
            operation: entry.operation,
            payload: entry.payload,
            status: entry.status,
            error_message: entry.error_message,
            attempt: entry.attempt,
            created_at,
            completed_at: entry.status.is_terminal().then_some(created_at),
        });

        Ok(id)
    }

    async fn query_pending(&self, limit: usize) -> SyncResult<Vec<SyncLogEntry>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .entries
            .iter()
            .filter(|entry| entry.status == SyncStatus::Pending && !entry.is_completed())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn query_failed(&self, limit: usize) -> SyncResult<Vec<SyncLogEntry>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.status == SyncStatus::Failed)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn entry(&self, id: i64) -> SyncResult<Option<SyncLogEntry>> {
        let inner = self.inner.lock().await;

        Ok(inner.entries.iter().find(|entry| entry.id == id).cloned())
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

        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.entries.iter_mut().find(|entry| entry.id == id) else {
            bail!(
                ErrorKind::InvalidState,
                "Sync log entry not found",
                format!("entry {id}")
            );
        };

        if entry.is_completed() {
            bail!(
                ErrorKind::InvalidState,
                "Sync log entry is already completed",
                format!("entry {id}")
            );
        }

        entry.status = status;
        entry.error_message = error_message;
        entry.completed_at = Some(Utc::now());

        Ok(())
    }
}
