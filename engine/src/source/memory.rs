use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::source::TabularSource;
use crate::types::SourceRecord;

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<String, Vec<SourceRecord>>,
}

/// In-memory tabular source for tests and local development.
///
/// Records keep their insertion order, which is the order they are listed in.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `table` without records if it does not exist yet.
    pub async fn create_table(&self, table: &str) {
        let mut inner = self.inner.lock().await;
        inner.tables.entry(table.to_string()).or_default();
    }

    /// Inserts `record` into `table`, replacing a record with the same id.
    pub async fn upsert_record(&self, table: &str, record: SourceRecord) {
        let mut inner = self.inner.lock().await;
        let records = inner.tables.entry(table.to_string()).or_default();

        match records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    /// Removes the record with `id` from `table`. Returns whether it existed.
    pub async fn remove_record(&self, table: &str, id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(records) = inner.tables.get_mut(table) else {
            return false;
        };

        let before = records.len();
        records.retain(|record| record.id != id);
        records.len() != before
    }
}

impl TabularSource for MemorySource {
    fn name() -> &'static str {
        "memory"
    }

    async fn list_tables(&self) -> SyncResult<Vec<String>> {
        let inner = self.inner.lock().await;

        Ok(inner.tables.keys().cloned().collect())
    }

    async fn list_records(&self, table: &str) -> SyncResult<Vec<SourceRecord>> {
        let inner = self.inner.lock().await;

        match inner.tables.get(table) {
            Some(records) => Ok(records.clone()),
            None => bail!(
                ErrorKind::SourceQueryFailed,
                "Source table not found",
                format!("table '{table}' does not exist in the source")
            ),
        }
    }
}
