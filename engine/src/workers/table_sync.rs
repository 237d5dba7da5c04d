use std::collections::HashSet;

use serde_json::json;
use tracing::debug;

use crate::error::SyncResult;
use crate::log::{SyncLog, SyncOperation};
use crate::reconcile::ReconcileAction;
use crate::report::TableSyncReport;
use crate::schema::{diff, infer_source_fields};
use crate::source::TabularSource;
use crate::store::RelationalStore;
use crate::workers::SyncWorker;

impl<Src, St, L> SyncWorker<Src, St, L>
where
    Src: TabularSource + Sync,
    St: RelationalStore + Sync,
    L: SyncLog + Sync,
{
    /// Synchronizes the schema and then the records of `table`.
    ///
    /// Returns an error only when the table cannot be synchronized at all, e.g. because its
    /// records cannot be listed. Failed schema changes and records are logged and counted
    /// without stopping the table.
    pub(super) async fn sync_table(&self, table: &str) -> SyncResult<TableSyncReport> {
        let mut report = TableSyncReport::new(table);

        let records = self.list_records(table).await?;
        let fields = infer_source_fields(&records);
        debug!(records = records.len(), fields = fields.len(), "sampled source table");

        // The schema is fully synchronized before any record is written, so that new columns
        // exist by the time data needing them arrives.
        let applier = self.applier();
        let mut columns = self.get_columns(table).await?;
        if columns.is_empty() {
            applier.create_table(table).await?;
            columns = self.get_columns(table).await?;
        }

        let changes = diff(&fields, &columns, &self.mapper);
        let outcome = applier.apply(table, &changes).await;
        report.schema_changes_applied = outcome.applied;
        report.schema_errors = outcome.errors.len();

        // Records are written without the columns whose change failed.
        let available = if outcome.errors.is_empty() {
            None
        } else {
            let columns = self.get_columns(table).await?;
            Some(
                columns
                    .into_iter()
                    .map(|column| column.name)
                    .collect::<HashSet<_>>(),
            )
        };

        let mut reconciler = self.reconciler();
        if let Some(columns) = &available {
            reconciler = reconciler.with_columns(columns);
        }

        for record in records {
            let record = record.into_sync_record(table);
            let reconciled = match reconciler.reconcile(&record).await {
                Ok(reconciled) => reconciled,
                Err(_) => {
                    report.failed_records += 1;
                    continue;
                }
            };

            match reconciled.action {
                ReconcileAction::Insert => report.inserted += 1,
                ReconcileAction::Update => report.updated += 1,
            }

            // Once the queued column change succeeds, the next pending pass writes the rest.
            if reconciled
                .deferred_columns
                .iter()
                .any(|column| outcome.requeued_columns.contains(column))
            {
                self.recorder
                    .queue_retry(
                        table,
                        SyncOperation::Update {
                            source_id: record.source_id.clone(),
                        },
                        json!({ "deferred_columns": reconciled.deferred_columns }),
                    )
                    .await;
                report.deferred_records += 1;
            }
        }

        Ok(report)
    }
}
