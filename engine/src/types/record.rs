use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Value;

/// One Source row as returned by a tabular source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, fields: BTreeMap<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Binds the record to `table_name`, producing the unit of reconciliation.
    pub fn into_sync_record(self, table_name: impl Into<String>) -> SyncRecord {
        SyncRecord {
            source_id: self.id,
            table_name: table_name.into(),
            fields: self.fields,
        }
    }
}

/// A Source row bound to the table it is reconciled into.
///
/// `source_id` is stored verbatim in the identity column of the Target row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub source_id: String,
    pub table_name: String,
    pub fields: BTreeMap<String, Value>,
}
