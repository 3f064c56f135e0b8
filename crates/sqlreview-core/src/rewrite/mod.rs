//! Row-limit rewriting.
//!
//! Statements are edited in place through [`TokenRewriter`], so text outside
//! the edited tokens survives byte for byte. When the precise edit is not
//! possible the statement is wrapped in a dialect-specific outer query
//! instead.

mod oracle;

pub use oracle::{limit_oracle_query, should_skip_limit, OracleVersion};

use crate::error::RewriteError;
use crate::parser::tokenize;
use crate::types::Dialect;
use std::ops::Range;
#[cfg(feature = "tracing")]
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EditKind {
    /// Attached to the token that ends at the offset.
    InsertAfter,
    /// Attached to the token that starts at the offset.
    InsertBefore,
    Replace,
}

#[derive(Debug, Clone)]
struct Edit {
    range: Range<usize>,
    kind: EditKind,
    text: String,
}

/// Byte-span edits over a source string, rendered in one pass.
///
/// At a shared offset, text inserted after the preceding token comes first,
/// then text inserted before the following token, then any replacement.
/// Edits of the same kind keep their call order.
#[derive(Debug, Clone)]
pub struct TokenRewriter<'a> {
    source: &'a str,
    edits: Vec<Edit>,
}

impl<'a> TokenRewriter<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            edits: Vec::new(),
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn insert_before(&mut self, offset: usize, text: impl Into<String>) -> &mut Self {
        self.push(offset..offset, EditKind::InsertBefore, text)
    }

    pub fn insert_after(&mut self, offset: usize, text: impl Into<String>) -> &mut Self {
        self.push(offset..offset, EditKind::InsertAfter, text)
    }

    pub fn replace(&mut self, span: Range<usize>, text: impl Into<String>) -> &mut Self {
        self.push(span, EditKind::Replace, text)
    }

    fn push(&mut self, range: Range<usize>, kind: EditKind, text: impl Into<String>) -> &mut Self {
        self.edits.push(Edit {
            range,
            kind,
            text: text.into(),
        });
        self
    }

    /// Applies every edit to the source.
    pub fn render(&self) -> Result<String, RewriteError> {
        let mut edits: Vec<&Edit> = self.edits.iter().collect();
        // Stable sort keeps call order within one offset and kind.
        edits.sort_by_key(|edit| (edit.range.start, edit.kind));

        let mut out = String::with_capacity(self.source.len() + 32);
        let mut cursor = 0;
        for edit in edits {
            let Range { start, end } = edit.range;
            if start > end
                || end > self.source.len()
                || !self.source.is_char_boundary(start)
                || !self.source.is_char_boundary(end)
            {
                return Err(RewriteError::OutOfBounds { start, end });
            }
            if start < cursor {
                return Err(RewriteError::OverlappingEdit { offset: start });
            }
            out.push_str(&self.source[cursor..start]);
            out.push_str(&edit.text);
            cursor = end;
        }
        out.push_str(&self.source[cursor..]);
        Ok(out)
    }
}

/// Runs `precise`, and on any failure returns `fallback` instead.
pub fn rewrite_or_fallback<P, F>(sql: &str, max_rows: u64, precise: P, fallback: F) -> String
where
    P: FnOnce(&str, u64) -> Result<String, RewriteError>,
    F: FnOnce(&str, u64) -> String,
{
    match precise(sql, max_rows) {
        Ok(rewritten) => rewritten,
        Err(_err) => {
            #[cfg(feature = "tracing")]
            debug!(error = %_err, "precise rewrite failed, wrapping statement");
            fallback(sql, max_rows)
        }
    }
}

/// Strips surrounding whitespace and trailing semicolons.
pub fn trim_statement(sql: &str) -> &str {
    sql.trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// True when the statement's last token is a `--` comment, which would
/// swallow anything appended on the same line.
pub(crate) fn ends_with_line_comment(sql: &str, dialect: Dialect) -> bool {
    tokenize(sql, dialect)
        .ok()
        .and_then(|tokens| tokens.last().map(|token| token.is_line_comment()))
        .unwrap_or(false)
}

/// `prefix(sql)suffix`, moving the closing parenthesis onto its own line
/// when the statement ends in a line comment.
pub(crate) fn wrap(sql: &str, dialect: Dialect, prefix: &str, suffix: &str) -> String {
    let separator = if ends_with_line_comment(sql, dialect) {
        "\n"
    } else {
        ""
    };
    format!("{prefix}({sql}{separator}){suffix}")
}

/// Bounds a query to `max_rows` rows in the given dialect.
///
/// `version` is the server version banner; it only matters for Oracle, where
/// an unknown version takes the `ROWNUM` wrapper that every release accepts.
/// Oracle `SELECT ... FROM DUAL` statements come back unchanged.
pub fn limit_query(dialect: Dialect, sql: &str, max_rows: u64, version: Option<&str>) -> String {
    let statement = trim_statement(sql);
    match dialect {
        Dialect::Oracle => {
            if should_skip_limit(statement) {
                return statement.to_string();
            }
            let version = version
                .and_then(OracleVersion::parse)
                .unwrap_or(OracleVersion::LEGACY);
            limit_oracle_query(statement, max_rows, version)
        }
        Dialect::Mysql => wrap(
            statement,
            dialect,
            "SELECT * FROM ",
            &format!(" result LIMIT {max_rows}"),
        ),
        Dialect::Postgres | Dialect::Snowflake => wrap(
            statement,
            dialect,
            "WITH result AS ",
            &format!(" SELECT * FROM result LIMIT {max_rows}"),
        ),
        Dialect::Mssql => wrap(
            statement,
            dialect,
            &format!("SELECT TOP {max_rows} * FROM "),
            " result",
        ),
    }
}
