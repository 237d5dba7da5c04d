use std::future::Future;

use crate::error::SyncResult;
use crate::types::SourceRecord;

/// Trait for spreadsheet-like systems the engine synchronizes from.
///
/// A [`TabularSource`] exposes named tables whose rows are flat field-name to value maps with a
/// stable identifier. The Source is authoritative: the engine never writes back to it.
///
/// Every call may fail or hang. The engine bounds each call with a timeout and treats any error
/// as a failure of that call only.
pub trait TabularSource {
    /// Returns the name of the source system.
    fn name() -> &'static str;

    /// Returns the names of all tables the source exposes.
    fn list_tables(&self) -> impl Future<Output = SyncResult<Vec<String>>> + Send;

    /// Returns every record of `table`, in source order.
    fn list_records(
        &self,
        table: &str,
    ) -> impl Future<Output = SyncResult<Vec<SourceRecord>>> + Send;
}
