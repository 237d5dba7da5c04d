use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::SchemaChange;
use crate::types::SqlType;

/// Whether an entry concerns the schema or the data of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    Schema,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Failed,
    Pending,
}

impl SyncStatus {
    /// Returns `true` for statuses that close an entry.
    pub fn is_terminal(self) -> bool {
        !matches!(self, SyncStatus::Pending)
    }
}

/// The operation an entry records, with what is needed to re-derive it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum SyncOperation {
    CreateTable,
    AddColumn {
        column_name: String,
        data_type: SqlType,
        source_field_name: String,
    },
    ModifyColumn {
        column_name: String,
        data_type: SqlType,
        previous_type: SqlType,
        source_field_name: String,
    },
    DropColumn {
        column_name: String,
    },
    Insert {
        source_id: String,
    },
    Update {
        source_id: String,
    },
    /// A record whose insert-or-update decision could not be made.
    Reconcile {
        source_id: String,
    },
    /// A whole table whose sync could not start, e.g. because listing its records failed.
    SyncTable,
}

impl SyncOperation {
    pub fn name(&self) -> &'static str {
        match self {
            SyncOperation::CreateTable => "create_table",
            SyncOperation::AddColumn { .. } => "add_column",
            SyncOperation::ModifyColumn { .. } => "modify_column",
            SyncOperation::DropColumn { .. } => "drop_column",
            SyncOperation::Insert { .. } => "insert",
            SyncOperation::Update { .. } => "update",
            SyncOperation::Reconcile { .. } => "reconcile",
            SyncOperation::SyncTable => "sync_table",
        }
    }

    pub fn sync_type(&self) -> SyncType {
        match self {
            SyncOperation::CreateTable
            | SyncOperation::AddColumn { .. }
            | SyncOperation::ModifyColumn { .. }
            | SyncOperation::DropColumn { .. } => SyncType::Schema,
            SyncOperation::Insert { .. }
            | SyncOperation::Update { .. }
            | SyncOperation::Reconcile { .. }
            | SyncOperation::SyncTable => SyncType::Data,
        }
    }

    /// Returns the source record id for record-level operations.
    pub fn source_id(&self) -> Option<&str> {
        match self {
            SyncOperation::Insert { source_id }
            | SyncOperation::Update { source_id }
            | SyncOperation::Reconcile { source_id } => Some(source_id),
            _ => None,
        }
    }
}

impl From<&SchemaChange> for SyncOperation {
    fn from(change: &SchemaChange) -> Self {
        match change.clone() {
            SchemaChange::AddColumn {
                column_name,
                data_type,
                source_field_name,
            } => SyncOperation::AddColumn {
                column_name,
                data_type,
                source_field_name,
            },
            SchemaChange::ModifyColumn {
                column_name,
                data_type,
                previous_type,
                source_field_name,
            } => SyncOperation::ModifyColumn {
                column_name,
                data_type,
                previous_type,
                source_field_name,
            },
            SchemaChange::DropColumn { column_name } => SyncOperation::DropColumn { column_name },
        }
    }
}

/// An entry about to be appended to the log.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncLogEntry {
    pub source_system: String,
    pub target_system: String,
    pub table_name: String,
    pub operation: SyncOperation,
    pub payload: serde_json::Value,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    /// Zero for the first attempt, incremented for every re-queue.
    pub attempt: u32,
}

/// An entry as stored in the log.
///
/// Once `completed_at` is set the entry never changes again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: i64,
    pub sync_type: SyncType,
    pub source_system: String,
    pub target_system: String,
    pub table_name: String,
    pub operation: SyncOperation,
    pub payload: serde_json::Value,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncLogEntry {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}
