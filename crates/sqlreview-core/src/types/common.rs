//! Advice model shared by every rule, the walk-through and the orchestrator.

use crate::error::Position;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome class of a single piece of advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AdviceStatus {
    Ok,
    Warning,
    Error,
}

impl fmt::Display for AdviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// A single structured finding produced while reviewing SQL.
///
/// Positions are 1-based and always expressed against the original,
/// unshifted source text of the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Advice {
    /// Severity of the finding.
    pub status: AdviceStatus,

    /// Numeric code from [`advice_codes`].
    pub code: i32,

    /// Identifier of the rule (or subsystem) that produced the finding.
    pub title: String,

    /// Human-readable message.
    pub content: String,

    /// 1-based source line, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    /// 1-based source column, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl Advice {
    pub fn new(
        status: AdviceStatus,
        code: i32,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code,
            title: title.into(),
            content: content.into(),
            line: None,
            column: None,
        }
    }

    pub fn error(code: i32, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(AdviceStatus::Error, code, title, content)
    }

    pub fn warning(code: i32, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(AdviceStatus::Warning, code, title, content)
    }

    /// The single entry returned when a review finds nothing.
    pub fn ok() -> Self {
        Self::new(AdviceStatus::Ok, advice_codes::OK, "OK", "")
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.line = Some(position.line);
        self.column = Some(position.column);
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Deterministic ordering key within a severity bucket.
    pub fn sort_key(&self) -> (usize, &str) {
        (self.line.unwrap_or(usize::MAX), self.content.as_str())
    }
}

/// Numeric advice codes understood by the calling platform.
///
/// Grouped by hundreds: statements (2xx), naming (3xx), columns (4xx),
/// tables (6xx), databases (7xx), indexes (8xx), DML (11xx), schemas (19xx)
/// and built-in checks (20xx).
pub mod advice_codes {
    pub const OK: i32 = 0;
    pub const INTERNAL: i32 = 1;

    pub const STATEMENT_SYNTAX_ERROR: i32 = 201;
    pub const STATEMENT_NO_WHERE: i32 = 202;
    pub const STATEMENT_SELECT_ALL: i32 = 203;
    pub const STATEMENT_LEADING_WILDCARD_LIKE: i32 = 204;
    pub const STATEMENT_DISALLOW_COMMIT: i32 = 206;
    pub const STATEMENT_REDUNDANT_ALTER_TABLE: i32 = 207;

    pub const NAMING_TABLE_CONVENTION_MISMATCH: i32 = 301;

    pub const NO_REQUIRED_COLUMN: i32 = 401;
    pub const COLUMN_CANNOT_NULL: i32 = 402;
    pub const COLUMN_NOT_EXISTS: i32 = 405;
    pub const COLUMN_EXISTS: i32 = 412;
    pub const DROP_ALL_COLUMNS: i32 = 413;

    pub const TABLE_NO_PK: i32 = 601;
    pub const TABLE_HAS_FK: i32 = 602;
    pub const TABLE_NOT_EXISTS: i32 = 604;
    pub const TABLE_EXISTS: i32 = 607;

    pub const NOT_CURRENT_DATABASE: i32 = 702;

    pub const INDEX_KEY_NUMBER_EXCEEDS_LIMIT: i32 = 802;
    pub const INDEX_EXISTS: i32 = 805;
    pub const PRIMARY_KEY_EXISTS: i32 = 806;
    pub const INDEX_EMPTY_KEYS: i32 = 807;
    pub const PRIMARY_KEY_NOT_EXISTS: i32 = 808;
    pub const INDEX_NOT_EXISTS: i32 = 809;
    pub const DUPLICATE_COLUMN_IN_INDEX: i32 = 812;
    pub const REDUNDANT_INDEX: i32 = 817;

    pub const INSERT_TOO_MANY_ROWS: i32 = 1101;
    pub const UPDATE_USE_LIMIT: i32 = 1102;
    pub const INSERT_USE_LIMIT: i32 = 1103;
    pub const DELETE_USE_ORDER_BY: i32 = 1105;
    pub const DELETE_USE_LIMIT: i32 = 1106;
    pub const INSERT_NOT_SPECIFY_COLUMN: i32 = 1107;

    pub const SCHEMA_NOT_EXISTS: i32 = 1901;

    pub const BUILTIN_PRIOR_BACKUP_CHECK: i32 = 2001;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advice_serializes_camel_case_without_missing_position() {
        let advice = Advice::error(advice_codes::TABLE_NO_PK, "table.require-pk", "missing");
        let json = serde_json::to_value(&advice).unwrap();

        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], 601);
        assert!(json.get("line").is_none());
    }

    #[test]
    fn sort_key_places_unpositioned_advice_last() {
        let positioned = Advice::warning(1, "a", "z").with_line(3);
        let floating = Advice::warning(1, "a", "a");
        assert!(positioned.sort_key() < floating.sort_key());
    }
}
