//! Tabular sources the engine reads from.

mod base;
pub mod memory;

pub use base::TabularSource;
