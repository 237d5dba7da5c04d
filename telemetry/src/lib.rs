//! Logging setup shared by the sync services and their tests.

pub mod tracing;
