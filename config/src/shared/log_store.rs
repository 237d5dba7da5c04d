use serde::Deserialize;

/// Backing store used for the sync log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogStoreConfig {
    /// Entries live in process memory and are lost on restart.
    Memory,
    /// Entries are persisted in the `sync.sync_log` table of the target database.
    #[default]
    Postgres,
}
