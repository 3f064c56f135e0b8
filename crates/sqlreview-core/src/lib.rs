//! Multi-dialect SQL review.
//!
//! [`check`] runs a configured rule list over a batch of statements and
//! returns positioned advice. [`limit_query`] caps a query's row count with
//! an in-place token edit where the dialect allows it.

pub mod advisor;
pub mod error;
pub mod parser;
pub mod rewrite;
pub mod types;

pub use advisor::{
    check, CancellationToken, ReviewContext, RuleDescriptor, RuleKind, RuleLevel, SqlReviewer,
};
pub use error::{ConfigError, ParseError, Position, ReviewError, RewriteError, RuleError};
pub use parser::{parse_statements, split, ParsedStatement};
pub use rewrite::{limit_oracle_query, limit_query, should_skip_limit, OracleVersion};
pub use types::{
    advice_codes, Advice, AdviceStatus, ChangeType, ColumnMetadata, DatabaseSchema, Dialect,
    IndexMetadata, SchemaMetadata, TableMetadata,
};
