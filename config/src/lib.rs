//! Configuration types and loading for the sync services.
//!
//! Configuration is layered: a base file, an environment-specific file and `SYNC_`-prefixed
//! environment variables, in increasing order of precedence.

pub mod environment;
mod load;
pub mod shared;

pub use load::{Config, LoadConfigError, load_config, load_config_from};
