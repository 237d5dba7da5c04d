//! Concurrency utilities for the orchestrator's background task.

pub mod shutdown;
pub mod timeout;
