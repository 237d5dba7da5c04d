//! Record reconciliation: insert-or-update of a single Source record.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::concurrency::timeout::{CallSide, with_timeout};
use crate::error::SyncResult;
use crate::log::recorder::LogRecorder;
use crate::log::{SyncLog, SyncOperation};
use crate::schema::FieldMapper;
use crate::store::{RelationalStore, RowPayload, payload_to_json};
use crate::types::{IDENTITY_COLUMN, SyncRecord, Value, is_reserved_column};

/// What reconciling a record did to the Target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Insert,
    Update,
}

/// Outcome of one reconciliation attempt before it is logged.
#[derive(Debug)]
pub struct ReconcileAttempt {
    /// The operation to log. [`SyncOperation::Reconcile`] if the lookup itself failed.
    pub operation: SyncOperation,
    pub payload: RowPayload,
    /// Mapped columns left out of the write because the Target does not have them yet.
    pub deferred_columns: Vec<String>,
    pub result: SyncResult<ReconcileAction>,
}

/// A record written to the Target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub action: ReconcileAction,
    pub deferred_columns: Vec<String>,
}

/// Builds the column payload for `record`.
///
/// Field names are mapped to column names. Fields mapping onto a reserved column are dropped,
/// and when several fields map to the same column the first one in field-name order wins.
pub fn build_payload(mapper: &FieldMapper, record: &SyncRecord) -> RowPayload {
    let mut payload = RowPayload::new();

    for (field, value) in &record.fields {
        let column = mapper.map_field_name(field);
        if is_reserved_column(&column) {
            continue;
        }
        payload.entry(column).or_insert_with(|| value.clone());
    }

    payload
}

/// Upserts Source records into the Target by their identity column.
#[derive(Debug)]
pub struct RecordReconciler<'a, St, L> {
    store: &'a St,
    recorder: &'a LogRecorder<L>,
    mapper: &'a FieldMapper,
    timeout: Duration,
    columns: Option<&'a HashSet<String>>,
}

impl<'a, St, L> RecordReconciler<'a, St, L>
where
    St: RelationalStore,
    L: SyncLog,
{
    pub fn new(
        store: &'a St,
        recorder: &'a LogRecorder<L>,
        mapper: &'a FieldMapper,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            recorder,
            mapper,
            timeout,
            columns: None,
        }
    }

    /// Restricts writes to `columns`, the columns currently present on the Target.
    ///
    /// Fields mapping to any other column are left out of the write and reported as deferred,
    /// so that a failed `AddColumn` does not block the rest of the record.
    pub fn with_columns(mut self, columns: &'a HashSet<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Reconciles `record` and logs the outcome.
    ///
    /// Errors are returned for counting only. They are already logged and must not abort the
    /// caller's record loop.
    pub async fn reconcile(&self, record: &SyncRecord) -> SyncResult<Reconciled> {
        let attempt = self.attempt(record).await;
        let table = record.table_name.as_str();
        let payload = JsonValue::Object(payload_to_json(&attempt.payload));

        match &attempt.result {
            Ok(action) => {
                debug!(
                    table,
                    source_id = %record.source_id,
                    ?action,
                    deferred = attempt.deferred_columns.len(),
                    "reconciled record"
                );
                self.recorder
                    .record_success(table, attempt.operation, payload, 0)
                    .await;
            }
            Err(err) => {
                self.recorder
                    .record_failure(table, attempt.operation, payload, 0, err)
                    .await;
            }
        }

        attempt.result.map(|action| Reconciled {
            action,
            deferred_columns: attempt.deferred_columns,
        })
    }

    /// Reconciles `record` without logging.
    ///
    /// The update is unconditional: an existing row is always rewritten, even if unchanged.
    pub async fn attempt(&self, record: &SyncRecord) -> ReconcileAttempt {
        let table = record.table_name.as_str();
        let source_id = record.source_id.as_str();
        let mut payload = build_payload(self.mapper, record);
        let deferred_columns = match self.columns {
            Some(columns) => {
                let deferred = payload
                    .keys()
                    .filter(|column| !columns.contains(*column))
                    .cloned()
                    .collect::<Vec<_>>();
                payload.retain(|column, _| columns.contains(column));
                deferred
            }
            None => Vec::new(),
        };

        let exists = with_timeout(
            CallSide::Target,
            "find_row_by_identity",
            self.timeout,
            self.store
                .find_row_by_identity(table, IDENTITY_COLUMN, source_id),
        )
        .await;

        let exists = match exists {
            Ok(exists) => exists,
            Err(err) => {
                return ReconcileAttempt {
                    operation: SyncOperation::Reconcile {
                        source_id: source_id.to_string(),
                    },
                    payload,
                    deferred_columns,
                    result: Err(err),
                };
            }
        };

        if exists {
            let result = with_timeout(
                CallSide::Target,
                "update_row",
                self.timeout,
                self.store
                    .update_row(table, IDENTITY_COLUMN, source_id, &payload),
            )
            .await;

            ReconcileAttempt {
                operation: SyncOperation::Update {
                    source_id: source_id.to_string(),
                },
                payload,
                deferred_columns,
                result: result.map(|()| ReconcileAction::Update),
            }
        } else {
            payload.insert(IDENTITY_COLUMN.to_string(), Value::from(source_id));

            let result = with_timeout(
                CallSide::Target,
                "insert_row",
                self.timeout,
                self.store.insert_row(table, &payload),
            )
            .await;

            ReconcileAttempt {
                operation: SyncOperation::Insert {
                    source_id: source_id.to_string(),
                },
                payload,
                deferred_columns,
                result: result.map(|()| ReconcileAction::Insert),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::log::memory::MemorySyncLog;
    use crate::store::memory::MemoryRelationalStore;
    use crate::types::{DdlStatement, SqlType};

    fn record(source_id: &str, fields: &[(&str, Value)]) -> SyncRecord {
        SyncRecord {
            source_id: source_id.to_string(),
            table_name: "artists".to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn payload_skips_reserved_columns() {
        let record = record(
            "rec_1",
            &[
                ("Name (Korean)", Value::from("김환기")),
                ("Source ID", Value::from("spoofed")),
                ("id", Value::from(7)),
            ],
        );

        let payload = build_payload(&FieldMapper::default(), &record);

        assert_eq!(payload.len(), 1);
        assert_eq!(payload["name_korean"], Value::from("김환기"));
    }

    #[tokio::test]
    async fn inserts_then_updates_in_place() {
        let store = MemoryRelationalStore::new();
        store.exec_ddl("artists", &DdlStatement::CreateTable).await.unwrap();
        store
            .exec_ddl(
                "artists",
                &DdlStatement::AddColumn {
                    column: "name".to_string(),
                    data_type: SqlType::Text,
                },
            )
            .await
            .unwrap();

        let recorder = LogRecorder::new(MemorySyncLog::new(), "airtable", "postgres", 3);
        let mapper = FieldMapper::default();
        let reconciler =
            RecordReconciler::new(&store, &recorder, &mapper, Duration::from_secs(1));

        let first = reconciler
            .reconcile(&record("rec_42", &[("Name", Value::from("Kim"))]))
            .await;
        let second = reconciler
            .reconcile(&record("rec_42", &[("Name", Value::from("Kim Whanki"))]))
            .await;

        assert_eq!(first.unwrap().action, ReconcileAction::Insert);
        assert_eq!(second.unwrap().action, ReconcileAction::Update);

        let rows = store.rows("artists").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], Value::from("Kim Whanki"));
    }

    #[tokio::test]
    async fn fields_without_a_column_are_deferred() {
        let store = MemoryRelationalStore::new();
        store.exec_ddl("artists", &DdlStatement::CreateTable).await.unwrap();
        store
            .exec_ddl(
                "artists",
                &DdlStatement::AddColumn {
                    column: "name".to_string(),
                    data_type: SqlType::Text,
                },
            )
            .await
            .unwrap();
        let columns = store
            .get_columns("artists")
            .await
            .unwrap()
            .into_iter()
            .map(|column| column.name)
            .collect::<HashSet<_>>();

        let recorder = LogRecorder::new(MemorySyncLog::new(), "airtable", "postgres", 3);
        let mapper = FieldMapper::default();
        let reconciler = RecordReconciler::new(&store, &recorder, &mapper, Duration::from_secs(1))
            .with_columns(&columns);

        let reconciled = reconciler
            .reconcile(&record(
                "rec_7",
                &[("Name", Value::from("Kim")), ("Notes", Value::from("painter"))],
            ))
            .await
            .unwrap();

        assert_eq!(reconciled.action, ReconcileAction::Insert);
        assert_eq!(reconciled.deferred_columns, vec!["notes".to_string()]);

        let rows = store.rows("artists").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], Value::from("Kim"));
        assert!(!rows[0].contains_key("notes"));
    }
}
