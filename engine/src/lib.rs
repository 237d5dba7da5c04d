pub mod concurrency;
pub mod error;
pub mod log;
#[macro_use]
pub mod macros;
pub mod orchestrator;
pub mod policy;
pub mod reconcile;
pub mod report;
pub mod schema;
pub mod source;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
