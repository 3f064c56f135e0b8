//! Types exchanged with callers of the review engine.
//!
//! Advice is the only output contract; dialects, change types and the schema
//! snapshot describe the input side.

mod common;
mod metadata;
mod request;

pub use common::{advice_codes, Advice, AdviceStatus};
pub use metadata::{ColumnMetadata, DatabaseSchema, IndexMetadata, SchemaMetadata, TableMetadata};
pub use request::{ChangeType, Dialect};
