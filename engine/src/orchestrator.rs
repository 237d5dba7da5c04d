use std::sync::Arc;

use config::shared::SyncConfig;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{Instrument, debug, error, info, info_span};

use crate::bail;
use crate::concurrency::shutdown::{ShutdownRx, ShutdownTx, create_shutdown_channel};
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::log::SyncLog;
use crate::report::{FullSyncReport, PendingPassReport};
use crate::source::TabularSource;
use crate::store::RelationalStore;
use crate::workers::SyncWorker;

#[derive(Debug)]
enum OrchestratorState {
    NotStarted,
    Started {
        pending_loop: JoinHandle<()>,
    },
    Stopping {
        pending_loop: JoinHandle<()>,
    },
}

/// Keeps a Target synchronized with a Source.
///
/// [`SyncOrchestrator::start`] runs one full sync and then spawns a background task that drains
/// pending sync log entries on every poll interval until [`SyncOrchestrator::stop`] is called.
#[derive(Debug)]
pub struct SyncOrchestrator<Src, St, L> {
    worker: SyncWorker<Src, St, L>,
    state: OrchestratorState,
    shutdown_tx: ShutdownTx,
}

impl<Src, St, L> SyncOrchestrator<Src, St, L>
where
    Src: TabularSource + Clone + Send + Sync + 'static,
    St: RelationalStore + Clone + Send + Sync + 'static,
    L: SyncLog + Clone + Send + Sync + 'static,
{
    pub fn new(config: SyncConfig, source: Src, store: St, log: L) -> Self {
        // The receiver is dropped here and re-created with `subscribe` on every start.
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            worker: SyncWorker::new(Arc::new(config), source, store, log),
            state: OrchestratorState::NotStarted,
            shutdown_tx,
        }
    }

    pub fn worker(&self) -> &SyncWorker<Src, St, L> {
        &self.worker
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, OrchestratorState::Started { .. })
    }

    /// Runs a full sync and starts the periodic pending pass.
    ///
    /// Returns `None` without doing anything when the orchestrator is already running. The
    /// configuration is checked against the Source before any Target change is made.
    pub async fn start(&mut self) -> SyncResult<Option<FullSyncReport>> {
        if self.is_running() {
            info!("orchestrator is already running, ignoring start");

            return Ok(None);
        }

        // A previous stop may still be winding down; its task must finish before a new one starts.
        self.wait_for_pending_loop().await?;

        let config = self.worker.config().clone();
        config.validate()?;

        let source_tables = self.worker.list_source_tables().await?;
        let unknown_tables: Vec<&str> = config
            .tables
            .iter()
            .filter(|table| !source_tables.contains(table))
            .map(String::as_str)
            .collect();
        if !unknown_tables.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "Configured tables do not exist in the source",
                unknown_tables.join(", ")
            );
        }

        info!(
            tables = config.tables.len(),
            poll_interval_ms = config.poll_interval_ms,
            "starting sync orchestrator"
        );

        let report = self.worker.full_sync().await?;

        let worker = self.worker.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let span = info_span!("pending_loop");
        let pending_loop =
            tokio::spawn(run_pending_loop(worker, config, shutdown_rx).instrument(span));

        self.state = OrchestratorState::Started { pending_loop };

        Ok(Some(report))
    }

    /// Signals the periodic pending pass to stop.
    ///
    /// Does not wait: a pass that is already running completes in the background. Calling it on
    /// an orchestrator that is not running is a no-op.
    pub fn stop(&mut self) {
        let state = std::mem::replace(&mut self.state, OrchestratorState::NotStarted);
        self.state = match state {
            OrchestratorState::Started { pending_loop } => {
                info!("stopping sync orchestrator");

                // Sending fails only when the task already exited, which is fine.
                let _ = self.shutdown_tx.send(());
                OrchestratorState::Stopping { pending_loop }
            }
            other => other,
        };
    }

    /// Stops the orchestrator and waits for the in-flight pass, if any, to finish.
    pub async fn stop_and_wait(&mut self) -> SyncResult<()> {
        self.stop();
        self.wait_for_pending_loop().await
    }

    async fn wait_for_pending_loop(&mut self) -> SyncResult<()> {
        let state = std::mem::replace(&mut self.state, OrchestratorState::NotStarted);
        let OrchestratorState::Stopping { pending_loop } = state else {
            self.state = state;

            return Ok(());
        };

        pending_loop.await.map_err(|err| {
            SyncError::from((
                ErrorKind::OrchestratorTaskPanic,
                "Pending loop task failed",
                err.to_string(),
            ))
        })
    }

    /// Runs a full sync outside of the periodic schedule.
    pub async fn full_sync(&self) -> SyncResult<FullSyncReport> {
        self.worker.full_sync().await
    }

    /// Runs a pending pass outside of the periodic schedule.
    pub async fn process_pending(&self) -> SyncResult<PendingPassReport> {
        self.worker.process_pending().await
    }

    /// Explicitly drops a column from a Target table.
    pub async fn drop_column(&self, table: &str, column: &str) -> SyncResult<()> {
        self.worker.drop_column(table, column).await
    }
}

async fn run_pending_loop<Src, St, L>(
    worker: SyncWorker<Src, St, L>,
    config: SyncConfig,
    mut shutdown_rx: ShutdownRx,
) where
    Src: TabularSource + Sync,
    St: RelationalStore + Sync,
    L: SyncLog + Sync,
{
    let period = config.poll_interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                info!("pending loop received shutdown signal");
                break;
            }

            _ = ticker.tick() => {
                match worker.process_pending().await {
                    Ok(report) => debug!(?report, "pending pass completed"),
                    Err(err) if err.kind() == ErrorKind::SyncInProgress => {
                        debug!("skipping pending pass, another pass is in progress");
                    }
                    Err(err) => error!(error = %err, "pending pass failed"),
                }
            }
        }
    }

    info!("pending loop stopped");
}
