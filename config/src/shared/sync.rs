use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde::Deserialize;

use crate::shared::ValidationError;

const fn default_poll_interval_ms() -> u64 {
    60_000
}

const fn default_pending_batch_size() -> usize {
    50
}

const fn default_operation_timeout_ms() -> u64 {
    30_000
}

const fn default_max_retry_attempts() -> u32 {
    5
}

fn default_source_system() -> String {
    "airtable".to_string()
}

fn default_target_system() -> String {
    "postgres".to_string()
}

/// Settings consumed by the sync orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// Logical tables to synchronize, in the order a full sync visits them.
    pub tables: Vec<String>,
    /// Cadence of the pending-changes pass.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Source field name to target column name overrides.
    #[serde(default)]
    pub field_overrides: BTreeMap<String, String>,
    /// Maximum number of pending sync log entries drained per pass.
    #[serde(default = "default_pending_batch_size")]
    pub pending_batch_size: usize,
    /// Upper bound for every single source or target call.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    /// Number of automatic re-attempts for transient failures.
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Name recorded as the source system on every sync log entry.
    #[serde(default = "default_source_system")]
    pub source_system: String,
    /// Name recorded as the target system on every sync log entry.
    #[serde(default = "default_target_system")]
    pub target_system: String,
}

impl SyncConfig {
    /// Creates a configuration for `tables` with default settings.
    pub fn new<I, T>(tables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
            poll_interval_ms: default_poll_interval_ms(),
            field_overrides: BTreeMap::new(),
            pending_batch_size: default_pending_batch_size(),
            operation_timeout_ms: default_operation_timeout_ms(),
            max_retry_attempts: default_max_retry_attempts(),
            source_system: default_source_system(),
            target_system: default_target_system(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tables.is_empty() {
            return Err(ValidationError::NoTables);
        }

        let mut seen = HashSet::with_capacity(self.tables.len());
        for (position, table) in self.tables.iter().enumerate() {
            if table.trim().is_empty() {
                return Err(ValidationError::BlankTableName(position));
            }
            if !seen.insert(table.as_str()) {
                return Err(ValidationError::DuplicateTable(table.clone()));
            }
        }

        if self.poll_interval_ms == 0 {
            return Err(ValidationError::ZeroValue("sync.poll_interval_ms"));
        }
        if self.pending_batch_size == 0 {
            return Err(ValidationError::ZeroValue("sync.pending_batch_size"));
        }
        if self.operation_timeout_ms == 0 {
            return Err(ValidationError::ZeroValue("sync.operation_timeout_ms"));
        }

        for (field, column) in &self.field_overrides {
            if field.trim().is_empty() || column.trim().is_empty() {
                return Err(ValidationError::InvalidFieldOverride(field.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied_when_deserializing() {
        let config: SyncConfig = serde_json::from_str(r#"{"tables": ["artists"]}"#).unwrap();

        assert_eq!(config, SyncConfig::new(["artists"]));
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.pending_batch_size, 50);
    }

    #[test]
    fn rejects_empty_and_duplicate_tables() {
        assert_eq!(
            SyncConfig::new(Vec::<String>::new()).validate(),
            Err(ValidationError::NoTables)
        );
        assert_eq!(
            SyncConfig::new(["artists", " "]).validate(),
            Err(ValidationError::BlankTableName(1))
        );
        assert_eq!(
            SyncConfig::new(["artists", "artists"]).validate(),
            Err(ValidationError::DuplicateTable("artists".to_string()))
        );
    }

    #[test]
    fn rejects_zero_interval_and_blank_overrides() {
        let mut config = SyncConfig::new(["artists"]);
        config.poll_interval_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ValidationError::ZeroValue("sync.poll_interval_ms"))
        );

        let mut config = SyncConfig::new(["artists"]);
        config
            .field_overrides
            .insert("Name (Korean)".to_string(), String::new());
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidFieldOverride("Name (Korean)".to_string()))
        );
    }
}
