//! Sync service binary.
//!
//! Loads the configuration, initializes tracing, and keeps the Postgres target synchronized with
//! the HTTP tabular source until Ctrl+C is received.

use config::environment::Environment;
use telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::core::start_syncer;
use crate::settings::load_syncer_config;

mod core;
mod migrations;
mod settings;
mod source;

fn main() -> anyhow::Result<()> {
    let environment = Environment::load()?;
    let syncer_config = load_syncer_config(environment)?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"), environment)?;

    info!(%environment, tables = ?syncer_config.sync.tables, "starting syncer");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    if let Err(err) = runtime.block_on(start_syncer(syncer_config)) {
        error!(error = %err, "syncer stopped with an error");

        return Err(err);
    }

    info!("syncer stopped");

    Ok(())
}
