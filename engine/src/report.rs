//! Summaries returned by sync passes.

use std::fmt;

/// Outcome of synchronizing one table during a full sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSyncReport {
    pub table: String,
    pub schema_changes_applied: usize,
    pub schema_errors: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failed_records: usize,
    /// Records written without some columns, queued to be completed by a pending pass.
    pub deferred_records: usize,
    /// Set when the table could not be synchronized at all.
    pub error: Option<String>,
}

impl TableSyncReport {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Returns `true` unless a table-level failure stopped the sync. Individual failed records
    /// and schema changes do not fail the table.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for TableSyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} schema changes ({} failed), {} inserted, {} updated, {} failed records",
            self.table,
            self.schema_changes_applied,
            self.schema_errors,
            self.inserted,
            self.updated,
            self.failed_records
        )?;

        if self.deferred_records > 0 {
            write!(f, ", {} deferred records", self.deferred_records)?;
        }

        if let Some(error) = &self.error {
            write!(f, ", table failed: {error}")?;
        }

        Ok(())
    }
}

/// Outcome of a full sync pass over every configured table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullSyncReport {
    pub tables: Vec<TableSyncReport>,
}

impl FullSyncReport {
    pub fn table(&self, table: &str) -> Option<&TableSyncReport> {
        self.tables.iter().find(|report| report.table == table)
    }

    pub fn succeeded_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|report| report.succeeded())
            .map(|report| report.table.as_str())
            .collect()
    }

    pub fn failed_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|report| !report.succeeded())
            .map(|report| report.table.as_str())
            .collect()
    }
}

/// Outcome of draining pending sync log entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingPassReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Entries whose operation was no longer needed against the current state.
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_tables_by_outcome() {
        let mut failed = TableSyncReport::new("exhibitions");
        failed.error = Some("Source call timed out".to_string());
        let mut partial = TableSyncReport::new("artists");
        partial.failed_records = 2;

        let report = FullSyncReport {
            tables: vec![partial, failed],
        };

        assert_eq!(report.succeeded_tables(), vec!["artists"]);
        assert_eq!(report.failed_tables(), vec!["exhibitions"]);
        assert_eq!(report.table("artists").map(|t| t.failed_records), Some(2));
    }
}
