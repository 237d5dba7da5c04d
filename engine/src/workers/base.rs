use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use config::shared::SyncConfig;
use serde_json::json;
use tracing::{Instrument, info, info_span};

use crate::bail;
use crate::concurrency::timeout::{CallSide, with_timeout};
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::log::SyncLog;
use crate::log::SyncOperation;
use crate::log::recorder::LogRecorder;
use crate::reconcile::RecordReconciler;
use crate::report::{FullSyncReport, TableSyncReport};
use crate::schema::{FieldMapper, SchemaApplier, SchemaChange};
use crate::source::TabularSource;
use crate::store::RelationalStore;
use crate::types::{ColumnSpec, SourceRecord, is_reserved_column};

/// Releases the pass flag when dropped.
#[derive(Debug)]
pub(super) struct PassGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Runs sync passes against one Source, Target and Sync Log.
///
/// Cloning is cheap and clones share the pass flag, so a clone handed to a background task
/// still cannot overlap with a pass started from the original.
#[derive(Debug, Clone)]
pub struct SyncWorker<Src, St, L> {
    pub(super) config: Arc<SyncConfig>,
    pub(super) source: Src,
    pub(super) store: St,
    pub(super) recorder: LogRecorder<L>,
    pub(super) mapper: Arc<FieldMapper>,
    busy: Arc<AtomicBool>,
}

impl<Src, St, L> SyncWorker<Src, St, L>
where
    Src: TabularSource + Sync,
    St: RelationalStore + Sync,
    L: SyncLog + Sync,
{
    pub fn new(config: Arc<SyncConfig>, source: Src, store: St, log: L) -> Self {
        let recorder = LogRecorder::new(
            log,
            config.source_system.clone(),
            config.target_system.clone(),
            config.max_retry_attempts,
        );
        let mapper = Arc::new(FieldMapper::new(&config.field_overrides));

        Self {
            config,
            source,
            store,
            recorder,
            mapper,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn mapper(&self) -> &FieldMapper {
        &self.mapper
    }

    /// Marks a pass as running, failing with [`ErrorKind::SyncInProgress`] if one already is.
    pub(super) fn begin_pass(&self, pass: &'static str) -> SyncResult<PassGuard> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            bail!(
                ErrorKind::SyncInProgress,
                "Another sync pass is in progress",
                format!("{pass} was not started")
            );
        }

        Ok(PassGuard {
            busy: self.busy.clone(),
        })
    }

    pub(super) fn timeout(&self) -> Duration {
        self.config.operation_timeout()
    }

    pub(super) fn applier(&self) -> SchemaApplier<'_, St, L> {
        SchemaApplier::new(&self.store, &self.recorder, self.timeout())
    }

    pub(super) fn reconciler(&self) -> RecordReconciler<'_, St, L> {
        RecordReconciler::new(&self.store, &self.recorder, &self.mapper, self.timeout())
    }

    pub async fn list_source_tables(&self) -> SyncResult<Vec<String>> {
        with_timeout(
            CallSide::Source,
            "list_tables",
            self.timeout(),
            self.source.list_tables(),
        )
        .await
    }

    pub(super) async fn list_records(&self, table: &str) -> SyncResult<Vec<SourceRecord>> {
        with_timeout(
            CallSide::Source,
            "list_records",
            self.timeout(),
            self.source.list_records(table),
        )
        .await
    }

    pub(super) async fn get_columns(&self, table: &str) -> SyncResult<Vec<ColumnSpec>> {
        with_timeout(
            CallSide::Target,
            "get_columns",
            self.timeout(),
            self.store.get_columns(table),
        )
        .await
    }

    /// Synchronizes every configured table, in configuration order.
    ///
    /// A table that cannot be synchronized is logged and reported, and the pass moves on to the
    /// next table.
    pub async fn full_sync(&self) -> SyncResult<FullSyncReport> {
        let _guard = self.begin_pass("full sync")?;

        info!(tables = self.config.tables.len(), "starting full sync");

        let mut report = FullSyncReport::default();
        for table in &self.config.tables {
            let span = info_span!("sync_table", table = %table);
            let table_report = match self.sync_table(table).instrument(span).await {
                Ok(table_report) => table_report,
                Err(err) => {
                    self.recorder
                        .record_failure(table, SyncOperation::SyncTable, json!({}), 0, &err)
                        .await;

                    let mut table_report = TableSyncReport::new(table.as_str());
                    table_report.error = Some(err.log_message());
                    table_report
                }
            };

            info!(report = %table_report, "table sync finished");
            report.tables.push(table_report);
        }

        info!(
            succeeded = report.succeeded_tables().len(),
            failed = report.failed_tables().len(),
            "full sync finished"
        );

        Ok(report)
    }

    /// Drops `column` from `table`.
    ///
    /// This is the only way a column is ever removed. The drop is logged like any other schema
    /// change.
    pub async fn drop_column(&self, table: &str, column: &str) -> SyncResult<()> {
        let _guard = self.begin_pass("drop column")?;

        if is_reserved_column(column) {
            bail!(
                ErrorKind::InvalidData,
                "Reserved columns cannot be dropped",
                format!("column '{column}' of table '{table}'")
            );
        }

        let change = SchemaChange::DropColumn {
            column_name: column.to_string(),
        };
        let outcome = self.applier().apply(table, &[change]).await;
        if !outcome.errors.is_empty() {
            return Err(SyncError::from(outcome.errors));
        }

        info!(table, column, "dropped column");

        Ok(())
    }
}
