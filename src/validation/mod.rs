// Validation - cross-checking extracted rows against the reference store
pub mod dates;
pub mod engine;
pub mod span_id;

pub use engine::{FieldIssue, RowVerdict, ValidationEngine, VerdictMap};
pub use span_id::SpanId;
