use std::collections::HashSet;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info};

use crate::concurrency::timeout::{CallSide, with_timeout};
use crate::error::{SyncError, SyncResult};
use crate::log::recorder::LogRecorder;
use crate::log::{SyncLog, SyncOperation};
use crate::schema::diff::SchemaChange;
use crate::store::RelationalStore;
use crate::types::DdlStatement;

/// Result of applying a list of schema changes to one table.
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub applied: usize,
    pub errors: Vec<SyncError>,
    /// Columns whose failed change was queued for a retry.
    pub requeued_columns: HashSet<String>,
}

/// Executes schema changes against the Target, logging every attempt.
#[derive(Debug)]
pub struct SchemaApplier<'a, St, L> {
    store: &'a St,
    recorder: &'a LogRecorder<L>,
    timeout: Duration,
}

impl<'a, St, L> SchemaApplier<'a, St, L>
where
    St: RelationalStore,
    L: SyncLog,
{
    pub fn new(store: &'a St, recorder: &'a LogRecorder<L>, timeout: Duration) -> Self {
        Self {
            store,
            recorder,
            timeout,
        }
    }

    /// Creates `table` with its bookkeeping columns.
    ///
    /// Only success is logged here. Without a table nothing else can be synchronized, so a failure
    /// is returned to the caller which logs it as a table-level failure.
    pub async fn create_table(&self, table: &str) -> SyncResult<()> {
        let statement = DdlStatement::CreateTable;
        self.execute(table, &statement).await?;

        info!(table, "created target table");
        self.recorder
            .record_success(
                table,
                SyncOperation::CreateTable,
                json!({ "statement": statement }),
                0,
            )
            .await;

        Ok(())
    }

    /// Applies `changes` in order.
    ///
    /// A failing change is logged and skipped: the remaining changes are still attempted.
    pub async fn apply(&self, table: &str, changes: &[SchemaChange]) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        for change in changes {
            let operation = SyncOperation::from(change);
            let statement = change.to_ddl();
            let payload = json!({ "statement": statement });

            match self.execute(table, &statement).await {
                Ok(()) => {
                    debug!(
                        table,
                        column = change.column_name(),
                        operation = operation.name(),
                        "applied schema change"
                    );
                    self.recorder
                        .record_success(table, operation, payload, 0)
                        .await;
                    outcome.applied += 1;
                }
                Err(err) => {
                    let failure = self
                        .recorder
                        .record_failure(table, operation, payload, 0, &err)
                        .await;
                    if failure.retry_entry_id.is_some() {
                        outcome
                            .requeued_columns
                            .insert(change.column_name().to_string());
                    }
                    outcome.errors.push(err);
                }
            }
        }

        outcome
    }

    /// Executes one statement without logging it.
    pub async fn execute(&self, table: &str, statement: &DdlStatement) -> SyncResult<()> {
        with_timeout(
            CallSide::Target,
            "exec_ddl",
            self.timeout,
            self.store.exec_ddl(table, statement),
        )
        .await
    }
}
