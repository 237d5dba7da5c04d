use std::collections::{HashMap, HashSet};
use std::collections::hash_map::Entry;

use tracing::{Instrument, debug, info, info_span};

use crate::concurrency::timeout::{CallSide, with_timeout};
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::log::{SyncLog, SyncLogEntry, SyncOperation, SyncStatus};
use crate::report::PendingPassReport;
use crate::schema::{diff_for_column, infer_source_fields};
use crate::source::TabularSource;
use crate::store::RelationalStore;
use crate::sync_error;
use crate::types::{DdlStatement, SourceRecord};
use crate::workers::SyncWorker;

/// Source records fetched during one pending pass, by table.
type SourceCache = HashMap<String, SyncResult<Vec<SourceRecord>>>;

#[derive(Debug)]
enum RetryOutcome {
    Succeeded,
    /// The current state no longer needs the operation.
    Skipped,
}

impl<Src, St, L> SyncWorker<Src, St, L>
where
    Src: TabularSource + Sync,
    St: RelationalStore + Sync,
    L: SyncLog + Sync,
{
    /// Re-attempts a bounded batch of pending sync log entries.
    ///
    /// Each operation is re-derived from the current Source and Target state instead of replaying
    /// the logged payload. Every entry is then completed, and failed transient operations are
    /// queued again as new pending entries.
    pub async fn process_pending(&self) -> SyncResult<PendingPassReport> {
        let _guard = self.begin_pass("pending pass")?;

        let entries = with_timeout(
            CallSide::Target,
            "query_pending",
            self.timeout(),
            self.recorder.log().query_pending(self.config.pending_batch_size),
        )
        .await?;

        let mut report = PendingPassReport::default();
        if entries.is_empty() {
            debug!("no pending sync log entries");
            return Ok(report);
        }

        info!(entries = entries.len(), "processing pending sync log entries");

        let mut cache = SourceCache::new();
        for entry in entries {
            report.attempted += 1;

            let span = info_span!(
                "retry_entry",
                entry_id = entry.id,
                table = %entry.table_name,
                operation = entry.operation.name(),
                attempt = entry.attempt,
            );
            match self.retry_entry(&entry, &mut cache).instrument(span).await {
                Ok(RetryOutcome::Succeeded) => {
                    self.recorder
                        .complete(entry.id, SyncStatus::Success, None)
                        .await;
                    report.succeeded += 1;
                }
                Ok(RetryOutcome::Skipped) => {
                    debug!(entry_id = entry.id, "pending operation no longer needed");
                    self.recorder
                        .complete(entry.id, SyncStatus::Success, None)
                        .await;
                    report.skipped += 1;
                }
                Err(err) => {
                    self.recorder.complete_failed_attempt(&entry, &err).await;
                    report.failed += 1;
                }
            }
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            "pending pass finished"
        );

        Ok(report)
    }

    async fn retry_entry(
        &self,
        entry: &SyncLogEntry,
        cache: &mut SourceCache,
    ) -> SyncResult<RetryOutcome> {
        let table = entry.table_name.as_str();

        match &entry.operation {
            SyncOperation::CreateTable => self.retry_create_table(table).await,
            SyncOperation::AddColumn { column_name, .. }
            | SyncOperation::ModifyColumn { column_name, .. } => {
                self.retry_schema_change(table, column_name, cache).await
            }
            SyncOperation::DropColumn { column_name } => {
                self.retry_drop_column(table, column_name).await
            }
            SyncOperation::Insert { source_id }
            | SyncOperation::Update { source_id }
            | SyncOperation::Reconcile { source_id } => {
                self.retry_record(table, source_id, cache).await
            }
            SyncOperation::SyncTable => {
                let report = self.sync_table(table).await?;
                info!(report = %report, "table sync finished");

                Ok(RetryOutcome::Succeeded)
            }
        }
    }

    async fn cached_records<'c>(
        &self,
        table: &str,
        cache: &'c mut SourceCache,
    ) -> SyncResult<&'c [SourceRecord]> {
        let records = match cache.entry(table.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.list_records(table).await),
        };

        records.as_deref().map_err(SyncError::clone)
    }

    async fn retry_create_table(&self, table: &str) -> SyncResult<RetryOutcome> {
        if !self.get_columns(table).await?.is_empty() {
            return Ok(RetryOutcome::Skipped);
        }

        self.applier()
            .execute(table, &DdlStatement::CreateTable)
            .await?;

        Ok(RetryOutcome::Succeeded)
    }

    async fn retry_schema_change(
        &self,
        table: &str,
        column_name: &str,
        cache: &mut SourceCache,
    ) -> SyncResult<RetryOutcome> {
        let records = self.cached_records(table, cache).await?;
        let fields = infer_source_fields(records);
        let columns = self.get_columns(table).await?;

        let Some(change) = diff_for_column(&fields, &columns, &self.mapper, column_name) else {
            return Ok(RetryOutcome::Skipped);
        };

        self.applier().execute(table, &change.to_ddl()).await?;

        Ok(RetryOutcome::Succeeded)
    }

    async fn retry_drop_column(&self, table: &str, column_name: &str) -> SyncResult<RetryOutcome> {
        let columns = self.get_columns(table).await?;
        if !columns.iter().any(|column| column.name == column_name) {
            return Ok(RetryOutcome::Skipped);
        }

        let statement = DdlStatement::DropColumn {
            column: column_name.to_string(),
        };
        self.applier().execute(table, &statement).await?;

        Ok(RetryOutcome::Succeeded)
    }

    async fn retry_record(
        &self,
        table: &str,
        source_id: &str,
        cache: &mut SourceCache,
    ) -> SyncResult<RetryOutcome> {
        let records = self.cached_records(table, cache).await?;
        let Some(record) = records.iter().find(|record| record.id == source_id) else {
            return Err(sync_error!(
                ErrorKind::SourceRecordMissing,
                "Source record no longer exists",
                format!("record '{source_id}' of table '{table}'")
            ));
        };

        let record = record.clone().into_sync_record(table);
        let columns = self
            .get_columns(table)
            .await?
            .into_iter()
            .map(|column| column.name)
            .collect::<HashSet<_>>();

        let attempt = self.reconciler().with_columns(&columns).attempt(&record).await;
        attempt.result?;

        if !attempt.deferred_columns.is_empty() {
            return Err(sync_error!(
                ErrorKind::TargetColumnPending,
                "Record written without columns missing from the target",
                attempt.deferred_columns.join(", ")
            ));
        }

        Ok(RetryOutcome::Succeeded)
    }
}
