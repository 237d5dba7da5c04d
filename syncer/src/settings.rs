use std::path::PathBuf;

use anyhow::Context;
use config::environment::Environment;
use config::load_config_from;
use config::shared::SyncerConfig;

/// Directory holding the configuration files, relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Loads and validates the syncer configuration for `environment`.
pub fn load_syncer_config(environment: Environment) -> anyhow::Result<SyncerConfig> {
    let directory = std::env::current_dir()
        .context("failed to determine the current directory")?
        .join(PathBuf::from(CONFIGURATION_DIR));

    let config = load_config_from::<SyncerConfig>(&directory, environment)
        .context("failed to load the syncer configuration")?;
    config
        .validate()
        .context("the syncer configuration is invalid")?;

    Ok(config)
}
