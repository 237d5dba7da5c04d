use std::fmt;

use config::shared::{SyncLogStoreConfig, SyncerConfig};
use engine::log::SyncLog;
use engine::log::memory::MemorySyncLog;
use engine::log::postgres::PostgresSyncLog;
use engine::orchestrator::SyncOrchestrator;
use engine::source::TabularSource;
use engine::store::RelationalStore;
use engine::store::postgres::PgRelationalStore;
use postgres::db::connect_to_target_database;
use tracing::{info, warn};

use crate::migrations::migrate_sync_log;
use crate::source::HttpSource;

const MIN_TARGET_CONNECTIONS: u32 = 1;
const MAX_TARGET_CONNECTIONS: u32 = 5;

/// Wires the collaborators described by `config` into an orchestrator and runs it until Ctrl+C.
pub async fn start_syncer(config: SyncerConfig) -> anyhow::Result<()> {
    let pool = connect_to_target_database(
        &config.target,
        MIN_TARGET_CONNECTIONS,
        MAX_TARGET_CONNECTIONS,
    )
    .await?;

    let source = HttpSource::new(&config.source, config.sync.tables.clone())?;
    let store = PgRelationalStore::new(pool.clone(), config.target.table_schema());

    // The sync log store is chosen at startup and dispatched statically from here on.
    match config.sync_log {
        SyncLogStoreConfig::Memory => {
            warn!("the sync log is kept in memory, pending retries are lost on restart");
            let log = MemorySyncLog::new();

            run_orchestrator(SyncOrchestrator::new(config.sync, source, store, log)).await
        }
        SyncLogStoreConfig::Postgres => {
            migrate_sync_log(&config.target).await?;
            let log = PostgresSyncLog::new(pool);

            run_orchestrator(SyncOrchestrator::new(config.sync, source, store, log)).await
        }
    }
}

async fn run_orchestrator<Src, St, L>(
    mut orchestrator: SyncOrchestrator<Src, St, L>,
) -> anyhow::Result<()>
where
    Src: TabularSource + Clone + Send + Sync + fmt::Debug + 'static,
    St: RelationalStore + Clone + Send + Sync + fmt::Debug + 'static,
    L: SyncLog + Clone + Send + Sync + fmt::Debug + 'static,
{
    if let Some(report) = orchestrator.start().await? {
        for table in &report.tables {
            info!(report = %table, "initial sync of table finished");
        }
        let failed_tables = report.failed_tables();
        if !failed_tables.is_empty() {
            warn!(
                ?failed_tables,
                "some tables failed their initial sync and were queued for retry"
            );
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("ctrl+c received, stopping syncer");

    orchestrator.stop_and_wait().await?;

    Ok(())
}
