use std::collections::BTreeMap;

use config::shared::SyncConfig;

use crate::log::memory::MemorySyncLog;
use crate::orchestrator::SyncOrchestrator;
use crate::source::memory::MemorySource;
use crate::store::memory::MemoryRelationalStore;
use crate::test_utils::faulty::{FaultInjector, FaultySource, FaultyStore};
use crate::types::{SourceRecord, Value};
use crate::workers::SyncWorker;

pub type TestSource = FaultySource<MemorySource>;
pub type TestStore = FaultyStore<MemoryRelationalStore>;
pub type TestOrchestrator = SyncOrchestrator<TestSource, TestStore, MemorySyncLog>;
pub type TestWorker = SyncWorker<TestSource, TestStore, MemorySyncLog>;

/// Builds a [`SourceRecord`] from `(field, value)` pairs.
pub fn record<I, K, V>(id: &str, fields: I) -> SourceRecord
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    let fields: BTreeMap<String, Value> = fields
        .into_iter()
        .map(|(name, value)| (name.into(), value.into()))
        .collect();

    SourceRecord::new(id, fields)
}

/// A source, store and sync log wired together, all in memory and sharing one fault table.
#[derive(Debug, Clone)]
pub struct TestEnvironment {
    pub source: MemorySource,
    pub store: MemoryRelationalStore,
    pub log: MemorySyncLog,
    pub faults: FaultInjector,
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            source: MemorySource::new(),
            store: MemoryRelationalStore::new(),
            log: MemorySyncLog::new(),
            faults: FaultInjector::new(),
        }
    }

    /// Adds `records` to `table` of the source, creating the table if needed.
    pub async fn seed(&self, table: &str, records: Vec<SourceRecord>) {
        self.source.create_table(table).await;
        for record in records {
            self.source.upsert_record(table, record).await;
        }
    }

    pub fn faulty_source(&self) -> TestSource {
        FaultySource::wrap(self.source.clone(), self.faults.clone())
    }

    pub fn faulty_store(&self) -> TestStore {
        FaultyStore::wrap(self.store.clone(), self.faults.clone())
    }

    pub fn worker(&self, config: SyncConfig) -> TestWorker {
        SyncWorker::new(
            config.into(),
            self.faulty_source(),
            self.faulty_store(),
            self.log.clone(),
        )
    }

    pub fn orchestrator(&self, config: SyncConfig) -> TestOrchestrator {
        SyncOrchestrator::new(
            config,
            self.faulty_source(),
            self.faulty_store(),
            self.log.clone(),
        )
    }
}
