#![cfg(feature = "test-utils")]

use config::shared::SyncConfig;
use engine::error::ErrorKind;
use engine::log::{SyncOperation, SyncStatus};
use engine::test_utils::faulty::FaultPoint;
use engine::test_utils::fixtures::{TestEnvironment, record};
use engine::store::RelationalStore;
use engine::types::{DdlStatement, SqlType, Value};
use serde_json::json;
use telemetry::tracing::init_test_tracing;

fn text(value: &str) -> Value {
    Value::from(value)
}

async fn column_type(env: &TestEnvironment, table: &str, column: &str) -> Option<SqlType> {
    env.store
        .get_columns(table)
        .await
        .unwrap()
        .into_iter()
        .find(|spec| spec.name == column)
        .map(|column| column.data_type)
}

#[tokio::test(flavor = "multi_thread")]
async fn new_table_is_created_and_populated() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed(
        "people",
        vec![
            record("rec_1", [("Email", text("a@b.com")), ("Name", text("Ann"))]),
            record("rec_2", [("Email", text("c@d.org")), ("Name", text("Bob"))]),
        ],
    )
    .await;
    let worker = env.worker(SyncConfig::new(["people"]));

    let report = worker.full_sync().await.unwrap();

    let table_report = report.table("people").unwrap();
    assert!(table_report.succeeded());
    assert_eq!(table_report.schema_changes_applied, 2);
    assert_eq!(table_report.inserted, 2);
    assert_eq!(table_report.updated, 0);

    assert_eq!(column_type(&env, "people", "email").await, Some(SqlType::Text));
    assert_eq!(column_type(&env, "people", "name").await, Some(SqlType::Text));

    let row = env.store.row("people", "rec_1").await.unwrap();
    assert_eq!(row.get("email"), Some(&text("a@b.com")));
    assert_eq!(row.get("name"), Some(&text("Ann")));

    let entries = env.log.entries().await;
    assert_eq!(entries[0].operation, SyncOperation::CreateTable);
    assert!(
        entries
            .iter()
            .all(|entry| entry.status == SyncStatus::Success)
    );
    assert_eq!(entries.len(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn overridden_fields_are_mapped_and_typed() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed(
        "authors",
        vec![record(
            "rec_1",
            [
                ("DOB", text("1990-01-01")),
                ("Phone", text("+1 (555) 123-4567")),
                ("Active", Value::from(true)),
                ("Books", Value::from(json!(3))),
                ("Tags", Value::from(json!(["a", "b"]))),
            ],
        )],
    )
    .await;
    let worker = env.worker(SyncConfig::new(["authors"]));

    worker.full_sync().await.unwrap();

    assert_eq!(
        column_type(&env, "authors", "date_of_birth").await,
        Some(SqlType::Timestamptz)
    );
    assert_eq!(column_type(&env, "authors", "phone").await, Some(SqlType::Text));
    assert_eq!(column_type(&env, "authors", "active").await, Some(SqlType::Boolean));
    assert_eq!(column_type(&env, "authors", "books").await, Some(SqlType::Numeric));
    assert_eq!(column_type(&env, "authors", "tags").await, Some(SqlType::Jsonb));
    assert_eq!(column_type(&env, "authors", "dob").await, None);

    let row = env.store.row("authors", "rec_1").await.unwrap();
    assert_eq!(row.get("date_of_birth"), Some(&text("1990-01-01")));
}

#[tokio::test(flavor = "multi_thread")]
async fn configured_overrides_take_precedence() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed("authors", vec![record("rec_1", [("DOB", text("1990-01-01"))])])
        .await;
    let mut config = SyncConfig::new(["authors"]);
    config
        .field_overrides
        .insert("DOB".to_string(), "born_on".to_string());
    let worker = env.worker(config);

    worker.full_sync().await.unwrap();

    assert!(column_type(&env, "authors", "born_on").await.is_some());
    assert!(column_type(&env, "authors", "date_of_birth").await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn resync_updates_existing_row() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed("people", vec![record("rec_42", [("Name", text("Ann"))])])
        .await;
    let worker = env.worker(SyncConfig::new(["people"]));

    worker.full_sync().await.unwrap();
    env.source
        .upsert_record("people", record("rec_42", [("Name", text("Annie"))]))
        .await;
    let report = worker.full_sync().await.unwrap();

    let table_report = report.table("people").unwrap();
    assert_eq!(table_report.inserted, 0);
    assert_eq!(table_report.updated, 1);

    let rows = env.store.rows("people").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&text("Annie")));

    let operations: Vec<_> = env
        .log
        .entries()
        .await
        .into_iter()
        .filter(|entry| entry.operation.source_id().is_some())
        .map(|entry| entry.operation)
        .collect();
    assert_eq!(
        operations,
        vec![
            SyncOperation::Insert {
                source_id: "rec_42".to_string()
            },
            SyncOperation::Update {
                source_id: "rec_42".to_string()
            },
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_schema_change_does_not_stop_the_table() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed(
        "people",
        vec![
            record(
                "rec_1",
                [
                    ("Alpha", text("a")),
                    ("Beta", text("b")),
                    ("Gamma", text("c")),
                ],
            ),
            record("rec_2", [("Alpha", text("a")), ("Gamma", text("c"))]),
        ],
    )
    .await;
    env.faults
        .fail(
            FaultPoint::column_ddl("people", "beta"),
            ErrorKind::TargetSchemaError,
        )
        .await;
    let worker = env.worker(SyncConfig::new(["people"]));

    let report = worker.full_sync().await.unwrap();

    let table_report = report.table("people").unwrap();
    assert!(table_report.succeeded());
    assert_eq!(table_report.schema_changes_applied, 2);
    assert_eq!(table_report.schema_errors, 1);
    assert_eq!(table_report.inserted, 2);
    assert_eq!(table_report.failed_records, 0);
    assert_eq!(table_report.deferred_records, 0);

    let add_column_statuses: Vec<_> = env
        .log
        .entries()
        .await
        .into_iter()
        .filter(|entry| matches!(entry.operation, SyncOperation::AddColumn { .. }))
        .map(|entry| entry.status)
        .collect();
    assert_eq!(
        add_column_statuses,
        vec![SyncStatus::Success, SyncStatus::Failed, SyncStatus::Success]
    );

    // Schema errors are manual, nothing is queued.
    assert!(
        env.log
            .entries()
            .await
            .iter()
            .all(|entry| entry.status != SyncStatus::Pending)
    );

    // The record carrying the failed column is written without it.
    let row = env.store.row("people", "rec_1").await.unwrap();
    assert_eq!(row.get("alpha"), Some(&text("a")));
    assert_eq!(row.get("gamma"), Some(&text("c")));
    assert_eq!(row.get("beta"), None);
    assert!(env.store.row("people", "rec_2").await.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_table_does_not_stop_other_tables() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed("people", vec![record("rec_1", [("Name", text("Ann"))])])
        .await;
    env.seed("books", vec![record("rec_2", [("Title", text("Dune"))])])
        .await;
    env.faults
        .fail(
            FaultPoint::list_records("people"),
            ErrorKind::SourceConnectionFailed,
        )
        .await;
    let worker = env.worker(SyncConfig::new(["people", "books"]));

    let report = worker.full_sync().await.unwrap();

    assert_eq!(report.failed_tables(), vec!["people"]);
    assert_eq!(report.succeeded_tables(), vec!["books"]);
    assert!(env.store.row("books", "rec_2").await.is_some());

    let table_entries: Vec<_> = env
        .log
        .entries()
        .await
        .into_iter()
        .filter(|entry| entry.operation == SyncOperation::SyncTable)
        .map(|entry| (entry.table_name, entry.status, entry.attempt))
        .collect();
    assert_eq!(
        table_entries,
        vec![
            ("people".to_string(), SyncStatus::Failed, 0),
            ("people".to_string(), SyncStatus::Pending, 1),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_full_sync_changes_no_schema() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed(
        "people",
        vec![record(
            "rec_1",
            [("Name", text("Ann")), ("Age", Value::from(json!(30)))],
        )],
    )
    .await;
    let worker = env.worker(SyncConfig::new(["people"]));

    worker.full_sync().await.unwrap();
    let ddl_after_first = env.store.executed_ddl().await.len();
    let report = worker.full_sync().await.unwrap();

    assert_eq!(env.store.executed_ddl().await.len(), ddl_after_first);
    assert_eq!(report.table("people").unwrap().schema_changes_applied, 0);
    assert_eq!(env.store.rows("people").await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn columns_are_never_dropped_implicitly() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed(
        "people",
        vec![record("rec_1", [("Name", text("Ann")), ("Nickname", text("A"))])],
    )
    .await;
    let worker = env.worker(SyncConfig::new(["people"]));
    worker.full_sync().await.unwrap();

    env.source
        .upsert_record("people", record("rec_1", [("Name", text("Ann"))]))
        .await;
    worker.full_sync().await.unwrap();

    assert!(column_type(&env, "people", "nickname").await.is_some());
    assert!(
        env.store
            .executed_ddl()
            .await
            .iter()
            .all(|(_, statement)| !matches!(statement, DdlStatement::DropColumn { .. }))
    );
    // Absent fields are not written, so the old value stays.
    let row = env.store.row("people", "rec_1").await.unwrap();
    assert_eq!(row.get("nickname"), Some(&text("A")));
}

#[tokio::test(flavor = "multi_thread")]
async fn changed_field_type_modifies_column() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed("people", vec![record("rec_1", [("Code", Value::from(json!(7)))])])
        .await;
    let worker = env.worker(SyncConfig::new(["people"]));
    worker.full_sync().await.unwrap();
    assert_eq!(column_type(&env, "people", "code").await, Some(SqlType::Numeric));

    env.source
        .upsert_record("people", record("rec_1", [("Code", text("A-7"))]))
        .await;
    worker.full_sync().await.unwrap();

    assert_eq!(column_type(&env, "people", "code").await, Some(SqlType::Text));
    let modify = env
        .log
        .entries()
        .await
        .into_iter()
        .find(|entry| matches!(entry.operation, SyncOperation::ModifyColumn { .. }))
        .unwrap();
    assert_eq!(modify.status, SyncStatus::Success);
    assert_eq!(
        modify.operation,
        SyncOperation::ModifyColumn {
            column_name: "code".to_string(),
            data_type: SqlType::Text,
            previous_type: SqlType::Numeric,
            source_field_name: "Code".to_string(),
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn explicit_drop_removes_column() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed(
        "people",
        vec![record("rec_1", [("Name", text("Ann")), ("Nickname", text("A"))])],
    )
    .await;
    let worker = env.worker(SyncConfig::new(["people"]));
    worker.full_sync().await.unwrap();

    worker.drop_column("people", "nickname").await.unwrap();

    assert!(column_type(&env, "people", "nickname").await.is_none());
    let last = env.log.entries().await.pop().unwrap();
    assert_eq!(
        last.operation,
        SyncOperation::DropColumn {
            column_name: "nickname".to_string()
        }
    );
    assert_eq!(last.status, SyncStatus::Success);

    let err = worker.drop_column("people", "source_id").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}
