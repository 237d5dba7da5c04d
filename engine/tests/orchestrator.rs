#![cfg(feature = "test-utils")]

use config::shared::SyncConfig;
use engine::error::ErrorKind;
use engine::log::{SyncOperation, SyncStatus};
use engine::test_utils::faulty::FaultPoint;
use engine::test_utils::fixtures::{TestEnvironment, record};
use engine::types::{SourceRecord, Value};
use telemetry::tracing::init_test_tracing;

fn people_records() -> Vec<SourceRecord> {
    vec![
        record("rec_1", [("Name", Value::from("Ann"))]),
        record("rec_2", [("Name", Value::from("Bob"))]),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn start_runs_full_sync_once() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed("people", people_records()).await;
    let mut orchestrator = env.orchestrator(SyncConfig::new(["people"]));

    let report = orchestrator.start().await.unwrap().unwrap();
    assert!(orchestrator.is_running());
    assert_eq!(report.table("people").unwrap().inserted, 2);

    // Starting again is a no-op.
    assert!(orchestrator.start().await.unwrap().is_none());
    assert_eq!(env.store.rows("people").await.len(), 2);
    assert_eq!(env.store.row_writes().await, 2);

    orchestrator.stop_and_wait().await.unwrap();
    assert!(!orchestrator.is_running());
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_is_idempotent() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed("people", people_records()).await;
    let mut orchestrator = env.orchestrator(SyncConfig::new(["people"]));

    // Stopping before starting does nothing.
    orchestrator.stop();
    orchestrator.stop_and_wait().await.unwrap();

    orchestrator.start().await.unwrap();
    orchestrator.stop();
    orchestrator.stop();
    assert!(!orchestrator.is_running());
    orchestrator.stop_and_wait().await.unwrap();

    // A stopped orchestrator can be started again.
    assert!(orchestrator.start().await.unwrap().is_some());
    assert!(orchestrator.is_running());
    orchestrator.stop_and_wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_table_is_rejected_before_any_change() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed("people", people_records()).await;
    let mut orchestrator = env.orchestrator(SyncConfig::new(["people", "ghosts"]));

    let err = orchestrator.start().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert_eq!(err.detail(), Some("ghosts"));
    assert!(!orchestrator.is_running());
    assert!(env.store.executed_ddl().await.is_empty());
    assert!(env.log.entries().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_config_is_rejected() {
    init_test_tracing();

    let env = TestEnvironment::new();
    let mut orchestrator = env.orchestrator(SyncConfig::new(Vec::<String>::new()));

    let err = orchestrator.start().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert!(!orchestrator.is_running());
}

#[tokio::test(start_paused = true)]
async fn pending_entries_are_drained_on_schedule() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed("people", people_records()).await;
    env.faults
        .fail_times(
            FaultPoint::row_write("people", "rec_2"),
            ErrorKind::TargetConnectionFailed,
            1,
        )
        .await;
    let config = SyncConfig::new(["people"]);
    let poll_interval = config.poll_interval();
    let mut orchestrator = env.orchestrator(config);

    orchestrator.start().await.unwrap();
    assert!(env.store.row("people", "rec_2").await.is_none());

    // Nothing runs before the first interval elapses.
    tokio::time::sleep(poll_interval / 2).await;
    assert!(env.store.row("people", "rec_2").await.is_none());

    tokio::time::sleep(poll_interval).await;
    assert!(env.store.row("people", "rec_2").await.is_some());

    let retried = env
        .log
        .entries()
        .await
        .into_iter()
        .find(|entry| {
            entry.operation
                == SyncOperation::Insert {
                    source_id: "rec_2".to_string(),
                }
                && entry.attempt == 1
        })
        .unwrap();
    assert_eq!(retried.status, SyncStatus::Success);

    orchestrator.stop_and_wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stopped_orchestrator_runs_no_more_passes() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed("people", people_records()).await;
    env.faults
        .fail(
            FaultPoint::row_write("people", "rec_2"),
            ErrorKind::TargetConnectionFailed,
        )
        .await;
    let config = SyncConfig::new(["people"]);
    let poll_interval = config.poll_interval();
    let mut orchestrator = env.orchestrator(config);

    orchestrator.start().await.unwrap();
    orchestrator.stop_and_wait().await.unwrap();
    let entries_after_stop = env.log.entries().await.len();

    tokio::time::sleep(poll_interval * 3).await;

    assert_eq!(env.log.entries().await.len(), entries_after_stop);
    assert_eq!(
        env.faults
            .triggered(&FaultPoint::row_write("people", "rec_2"))
            .await,
        1
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn manual_passes_delegate_to_the_worker() {
    init_test_tracing();

    let env = TestEnvironment::new();
    env.seed("people", people_records()).await;
    let orchestrator = env.orchestrator(SyncConfig::new(["people"]));

    let report = orchestrator.full_sync().await.unwrap();
    assert_eq!(report.succeeded_tables(), vec!["people"]);
    assert_eq!(orchestrator.process_pending().await.unwrap().attempted, 0);

    orchestrator.drop_column("people", "name").await.unwrap();
}
