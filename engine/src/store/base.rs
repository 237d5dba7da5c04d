use std::collections::BTreeMap;
use std::future::Future;

use crate::error::SyncResult;
use crate::types::{ColumnSpec, DdlStatement, Value};

/// Column name to value map written to a Target row.
pub type RowPayload = BTreeMap<String, Value>;

/// Trait for relational databases the engine synchronizes into.
///
/// Every method is its own unit of work: no transaction spans several calls. Implementations
/// must make [`RelationalStore::exec_ddl`] idempotent for every [`DdlStatement`] except a
/// failing type change.
pub trait RelationalStore {
    /// Returns the name of the target system.
    fn name() -> &'static str;

    /// Returns the physical columns of `table`, or an empty list if the table does not exist.
    fn get_columns(&self, table: &str) -> impl Future<Output = SyncResult<Vec<ColumnSpec>>> + Send;

    /// Executes one schema statement against `table`.
    fn exec_ddl(
        &self,
        table: &str,
        statement: &DdlStatement,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns whether `table` has a row with `id_column = id_value`.
    fn find_row_by_identity(
        &self,
        table: &str,
        id_column: &str,
        id_value: &str,
    ) -> impl Future<Output = SyncResult<bool>> + Send;

    /// Inserts a new row into `table`.
    fn insert_row(
        &self,
        table: &str,
        payload: &RowPayload,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Overwrites the given columns of the row with `id_column = id_value`.
    fn update_row(
        &self,
        table: &str,
        id_column: &str,
        id_value: &str,
        payload: &RowPayload,
    ) -> impl Future<Output = SyncResult<()>> + Send;
}

/// Converts a payload into a JSON object, e.g. for binding or logging.
pub fn payload_to_json(payload: &RowPayload) -> serde_json::Map<String, serde_json::Value> {
    payload
        .iter()
        .map(|(column, value)| (column.clone(), value.clone().into()))
        .collect()
}
