//! Schema synchronization: type inference, field mapping, diffing and applying changes.

pub mod apply;
pub mod diff;
pub mod infer;
pub mod mapper;

pub use apply::{ApplyOutcome, SchemaApplier};
pub use diff::{SchemaChange, diff, diff_for_column};
pub use infer::{LogicalType, SourceField, infer, infer_source_fields};
pub use mapper::{FieldMapper, sanitize_field_name};
