//! Error types for parsing, configuration and rule execution.
//!
//! # Error Handling Strategy
//!
//! Reviewing SQL mixes fatal and non-fatal failures:
//!
//! - [`ConfigError`]: a rule list that cannot be built (unknown level, bad
//!   payload, unreadable template). Surfaced to the caller as
//!   [`ReviewError::Config`]; never silently ignored.
//!
//! - [`ParseError`]: malformed SQL. The orchestrator turns it into a single
//!   syntax-error [`crate::types::Advice`] and stops.
//!
//! - [`RuleError`]: a fault inside one rule. Isolated per rule and reported as
//!   an internal-error advice; the remaining rules keep running.
//!
//! Rewrite failures never escape: the rewriter degrades to its safe fallback.

use crate::types::Dialect;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
#[cfg(feature = "tracing")]
use tracing::trace;

/// Error encountered during SQL parsing.
///
/// This error preserves structured information from the underlying parser
/// including position information when available.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Human-readable error message.
    pub message: String,
    /// Position where the error occurred, if available.
    pub position: Option<Position>,
    /// The SQL dialect being parsed when the error occurred.
    pub dialect: Option<Dialect>,
    /// The specific category of parse error.
    pub kind: ParseErrorKind,
}

/// A 1-based line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub column: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Category of parse error for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseErrorKind {
    /// Unexpected token or character in input.
    #[default]
    SyntaxError,
    /// Missing required clause or keyword.
    MissingClause,
    /// Invalid or unexpected end of input.
    UnexpectedEof,
    /// Feature not supported by the current dialect.
    UnsupportedFeature,
    /// Lexer/tokenization error.
    LexerError,
}

impl ParseError {
    /// Creates a new parse error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
            dialect: None,
            kind: ParseErrorKind::SyntaxError,
        }
    }

    /// Creates a parse error with position information.
    pub fn with_position(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            position: Some(Position { line, column }),
            dialect: None,
            kind: ParseErrorKind::SyntaxError,
        }
    }

    /// Adds dialect context to the error.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Sets the error kind.
    pub fn with_kind(mut self, kind: ParseErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Shifts a statement-relative position into batch coordinates.
    ///
    /// Only positions on the statement's first line receive the column offset.
    pub fn shifted(mut self, base_line: usize, base_column: usize) -> Self {
        if let Some(pos) = self.position.as_mut() {
            if pos.line == 1 {
                pos.column += base_column;
            }
            pos.line += base_line;
        }
        self
    }

    /// Parses position from sqlparser error message format.
    ///
    /// sqlparser uses format like "Expected ..., found ... at Line: X, Column: Y"
    ///
    /// # Implementation Note
    ///
    /// This parsing is coupled to the `sqlparser` crate's error message format.
    /// Gracefully returns `None` when the expected format is not found.
    fn parse_position_from_message(message: &str) -> Option<Position> {
        static POSITION_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
        let re = POSITION_REGEX
            .get_or_init(|| Regex::new(r"Line:\s*(\d+)\s*,\s*Column:\s*(\d+)").ok())
            .as_ref()?;

        let result = re.captures(message).and_then(|caps| {
            let line: usize = caps.get(1)?.as_str().parse().ok()?;
            let column: usize = caps.get(2)?.as_str().parse().ok()?;
            Some(Position { line, column })
        });

        #[cfg(feature = "tracing")]
        if result.is_none() && (message.contains("Line") || message.contains("Column")) {
            trace!(
                "Failed to parse position from error message that appears to contain position info: {}",
                message
            );
        }

        result
    }

    /// Determines the error kind from the message content.
    fn infer_kind_from_message(message: &str) -> ParseErrorKind {
        let lower = message.to_lowercase();
        if lower.contains("unexpected end") || lower.contains("eof") {
            ParseErrorKind::UnexpectedEof
        } else if lower.contains("expected") {
            ParseErrorKind::MissingClause
        } else if lower.contains("not supported") || lower.contains("unsupported") {
            ParseErrorKind::UnsupportedFeature
        } else if lower.contains("lexer") || lower.contains("token") {
            ParseErrorKind::LexerError
        } else {
            ParseErrorKind::SyntaxError
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error")?;

        if let Some(dialect) = self.dialect {
            write!(f, " ({dialect})")?;
        }

        if let Some(pos) = self.position {
            write!(f, " at line {}, column {}", pos.line, pos.column)?;
        }

        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        let message = err.to_string();
        let position = Self::parse_position_from_message(&message);
        let kind = Self::infer_kind_from_message(&message);

        Self {
            message,
            position,
            dialect: None,
            kind,
        }
    }
}

impl From<sqlparser::tokenizer::TokenizerError> for ParseError {
    fn from(err: sqlparser::tokenizer::TokenizerError) -> Self {
        let message = err.to_string();
        let position = Self::parse_position_from_message(&message);

        Self {
            message,
            position,
            dialect: None,
            kind: ParseErrorKind::LexerError,
        }
    }
}

/// A rule list that cannot be turned into runnable rules.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown rule kind '{0}'")]
    UnknownRuleKind(String),

    #[error("unknown rule level '{level}' for rule '{rule}'")]
    UnknownLevel { rule: String, level: String },

    #[error("invalid payload for rule '{rule}': {message}")]
    InvalidPayload { rule: String, message: String },

    #[error("invalid rule document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid rule document: {0}")]
    Json(#[from] serde_json::Error),
}

/// A fault raised from inside a rule callback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("exit for {kind} without a matching scope")]
    ScopeUnderflow { kind: &'static str },

    #[error("unexpected node {kind}")]
    UnexpectedNode { kind: &'static str },

    #[error("{0}")]
    Internal(String),
}

/// The schema snapshot cannot absorb a statement of the batch.
///
/// `line` is the batch line of the offending statement's first token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct WalkThroughError {
    pub code: i32,
    pub message: String,
    pub line: usize,
}

impl WalkThroughError {
    pub fn new(code: i32, message: impl Into<String>, line: usize) -> Self {
        Self {
            code,
            message: message.into(),
            line,
        }
    }
}

/// Why a precise rewrite gave up.
///
/// Never surfaced by the public rewrite functions, which fall back to a
/// wrapping rewrite instead.
#[derive(Debug, Clone, Error)]
pub enum RewriteError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unsupported statement shape: {0}")]
    Unsupported(String),

    #[error("edit at byte {offset} overlaps an earlier edit")]
    OverlappingEdit { offset: usize },

    #[error("edit range {start}..{end} is outside the source")]
    OutOfBounds { start: usize, end: usize },
}

/// Errors `check` can hand back instead of an advice list.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("review cancelled")]
    Cancelled,
}
