//! The append-only sync log.
//!
//! Every schema and data operation the engine attempts ends up as a [`SyncLogEntry`]. Failed
//! operations that may succeed later are re-queued as new pending entries, which the pending
//! pass drains.

mod base;
mod entry;
pub mod memory;
pub mod postgres;
pub mod recorder;

pub use base::SyncLog;
pub use entry::*;
