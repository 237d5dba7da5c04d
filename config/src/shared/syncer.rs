use serde::Deserialize;

use crate::Config;
use crate::shared::{
    PgConnectionConfig, SourceConfig, SyncConfig, SyncLogStoreConfig, ValidationError,
};

/// Top-level configuration of the `syncer` service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncerConfig {
    pub source: SourceConfig,
    pub target: PgConnectionConfig,
    pub sync: SyncConfig,
    #[serde(default)]
    pub sync_log: SyncLogStoreConfig,
}

impl SyncerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.target.tls.validate()?;
        self.sync.validate()
    }
}

impl Config for SyncerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["sync.tables"];
}
