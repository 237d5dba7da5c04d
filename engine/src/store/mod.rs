//! Relational stores the engine writes to.

mod base;
pub mod memory;
pub mod postgres;

pub use base::{RelationalStore, RowPayload, payload_to_json};
