use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::source::TabularSource;
use crate::store::{RelationalStore, RowPayload};
use crate::types::{ColumnSpec, DdlStatement, IDENTITY_COLUMN, SourceRecord, Value};

/// A call of a wrapped source or store that can be made to fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    ListRecords { table: String },
    GetColumns { table: String },
    CreateTable { table: String },
    /// Any DDL statement touching `column` other than table creation.
    ColumnDdl { table: String, column: String },
    RowLookup { table: String, source_id: String },
    RowWrite { table: String, source_id: String },
}

impl FaultPoint {
    pub fn list_records(table: &str) -> Self {
        Self::ListRecords {
            table: table.to_string(),
        }
    }

    pub fn get_columns(table: &str) -> Self {
        Self::GetColumns {
            table: table.to_string(),
        }
    }

    pub fn create_table(table: &str) -> Self {
        Self::CreateTable {
            table: table.to_string(),
        }
    }

    pub fn column_ddl(table: &str, column: &str) -> Self {
        Self::ColumnDdl {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    pub fn row_lookup(table: &str, source_id: &str) -> Self {
        Self::RowLookup {
            table: table.to_string(),
            source_id: source_id.to_string(),
        }
    }

    pub fn row_write(table: &str, source_id: &str) -> Self {
        Self::RowWrite {
            table: table.to_string(),
            source_id: source_id.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Fault {
    kind: ErrorKind,
    /// `None` fails forever.
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct Faults {
    faults: HashMap<FaultPoint, Fault>,
    delays: HashMap<FaultPoint, Duration>,
    triggered: HashMap<FaultPoint, usize>,
}

/// Shared fault table, cloned into both the source and store wrappers if needed.
#[derive(Debug, Clone, Default)]
pub struct FaultInjector {
    inner: Arc<Mutex<Faults>>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call at `point` fail with `kind`.
    pub async fn fail(&self, point: FaultPoint, kind: ErrorKind) {
        self.insert(point, kind, None).await;
    }

    /// Makes the next `times` calls at `point` fail with `kind`.
    pub async fn fail_times(&self, point: FaultPoint, kind: ErrorKind, times: usize) {
        self.insert(point, kind, Some(times)).await;
    }

    /// Delays every call at `point` by `delay` before it runs.
    pub async fn delay(&self, point: FaultPoint, delay: Duration) {
        let mut inner = self.inner.lock().await;
        inner.delays.insert(point, delay);
    }

    /// Removes the fault and delay at `point`.
    pub async fn heal(&self, point: &FaultPoint) {
        let mut inner = self.inner.lock().await;
        inner.faults.remove(point);
        inner.delays.remove(point);
    }

    /// Returns how many calls at `point` were failed.
    pub async fn triggered(&self, point: &FaultPoint) -> usize {
        let inner = self.inner.lock().await;
        inner.triggered.get(point).copied().unwrap_or(0)
    }

    async fn insert(&self, point: FaultPoint, kind: ErrorKind, remaining: Option<usize>) {
        let mut inner = self.inner.lock().await;
        inner.faults.insert(point, Fault { kind, remaining });
    }

    async fn check(&self, point: FaultPoint) -> SyncResult<()> {
        let delay = {
            let inner = self.inner.lock().await;
            inner.delays.get(&point).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().await;
        let Some(fault) = inner.faults.get_mut(&point) else {
            return Ok(());
        };

        let kind = fault.kind;
        match &mut fault.remaining {
            Some(0) => return Ok(()),
            Some(remaining) => *remaining -= 1,
            None => {}
        }
        *inner.triggered.entry(point.clone()).or_default() += 1;

        Err(SyncError::from((
            kind,
            "Injected fault",
            format!("{point:?}"),
        )))
    }
}

/// A [`TabularSource`] whose calls can be made to fail or stall.
#[derive(Debug, Clone)]
pub struct FaultySource<Src> {
    wrapped: Src,
    faults: FaultInjector,
}

impl<Src> FaultySource<Src> {
    pub fn wrap(wrapped: Src, faults: FaultInjector) -> Self {
        Self { wrapped, faults }
    }

    pub fn wrapped(&self) -> &Src {
        &self.wrapped
    }
}

impl<Src> TabularSource for FaultySource<Src>
where
    Src: TabularSource + Sync,
{
    fn name() -> &'static str {
        Src::name()
    }

    async fn list_tables(&self) -> SyncResult<Vec<String>> {
        self.wrapped.list_tables().await
    }

    async fn list_records(&self, table: &str) -> SyncResult<Vec<SourceRecord>> {
        self.faults.check(FaultPoint::list_records(table)).await?;
        self.wrapped.list_records(table).await
    }
}

/// A [`RelationalStore`] whose calls can be made to fail or stall.
#[derive(Debug, Clone)]
pub struct FaultyStore<St> {
    wrapped: St,
    faults: FaultInjector,
}

impl<St> FaultyStore<St> {
    pub fn wrap(wrapped: St, faults: FaultInjector) -> Self {
        Self { wrapped, faults }
    }

    pub fn wrapped(&self) -> &St {
        &self.wrapped
    }
}

fn payload_source_id(payload: &RowPayload) -> &str {
    payload
        .get(IDENTITY_COLUMN)
        .and_then(Value::as_str)
        .unwrap_or_default()
}

impl<St> RelationalStore for FaultyStore<St>
where
    St: RelationalStore + Sync,
{
    fn name() -> &'static str {
        St::name()
    }

    async fn get_columns(&self, table: &str) -> SyncResult<Vec<ColumnSpec>> {
        self.faults.check(FaultPoint::get_columns(table)).await?;
        self.wrapped.get_columns(table).await
    }

    async fn exec_ddl(&self, table: &str, statement: &DdlStatement) -> SyncResult<()> {
        let point = match statement {
            DdlStatement::CreateTable => FaultPoint::create_table(table),
            DdlStatement::AddColumn { column, .. }
            | DdlStatement::AlterColumnType { column, .. }
            | DdlStatement::DropColumn { column } => FaultPoint::column_ddl(table, column),
        };
        self.faults.check(point).await?;
        self.wrapped.exec_ddl(table, statement).await
    }

    async fn find_row_by_identity(
        &self,
        table: &str,
        id_column: &str,
        id_value: &str,
    ) -> SyncResult<bool> {
        self.faults
            .check(FaultPoint::row_lookup(table, id_value))
            .await?;
        self.wrapped
            .find_row_by_identity(table, id_column, id_value)
            .await
    }

    async fn insert_row(&self, table: &str, payload: &RowPayload) -> SyncResult<()> {
        self.faults
            .check(FaultPoint::row_write(table, payload_source_id(payload)))
            .await?;
        self.wrapped.insert_row(table, payload).await
    }

    async fn update_row(
        &self,
        table: &str,
        id_column: &str,
        id_value: &str,
        payload: &RowPayload,
    ) -> SyncResult<()> {
        self.faults
            .check(FaultPoint::row_write(table, id_value))
            .await?;
        self.wrapped
            .update_row(table, id_column, id_value, payload)
            .await
    }
}
