//! The sync worker and the passes it runs.
//!
//! [`SyncWorker`] owns the collaborators and runs full syncs, pending passes and explicit
//! column drops. At most one of them runs at a time per worker.

mod base;
mod pending;
mod table_sync;

pub use base::SyncWorker;
