mod base;
mod connection;
mod log_store;
mod source;
mod sync;
mod syncer;

pub use base::*;
pub use connection::*;
pub use log_store::*;
pub use source::*;
pub use sync::*;
pub use syncer::*;
