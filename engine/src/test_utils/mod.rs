//! Utilities for testing sync passes without external systems.
//!
//! [`faulty`] wraps sources and stores so that chosen calls fail or stall, and [`fixtures`]
//! builds records and a fully wired in-memory setup.

pub mod faulty;
pub mod fixtures;
