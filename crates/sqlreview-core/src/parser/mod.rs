//! Parse adapter: splits a batch into statements and parses each one.
//!
//! Statements are parsed independently so that node positions stay relative
//! to their own text; `base_line`/`base_column` recover batch coordinates.

pub mod tokens;

pub use tokens::{line_col_to_offset, offset_to_position, tokenize, LineIndex, LocatedToken};

use crate::error::{ParseError, Position};
use crate::types::Dialect;
use sqlparser::ast::Statement;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;
use std::ops::Range;

/// One statement's slice of the batch, before parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementSlice {
    /// Statement text from its first to its last significant token.
    pub text: String,
    /// Byte range of `text` inside the batch.
    pub range: Range<usize>,
    /// Newlines preceding the statement in the batch.
    pub base_line: usize,
    /// Characters preceding the statement on its first line.
    pub base_column: usize,
    /// Tokens of the statement, spans in batch coordinates.
    pub tokens: Vec<LocatedToken>,
}

/// A parsed statement and everything needed to report batch positions.
#[derive(Debug, Clone)]
pub struct ParsedStatement {
    pub statement: Statement,
    pub text: String,
    /// Zero-based index in the batch.
    pub index: usize,
    pub range: Range<usize>,
    pub base_line: usize,
    pub base_column: usize,
}

impl ParsedStatement {
    /// Maps a statement-relative position onto the batch.
    pub fn absolute_position(&self, position: Position) -> Position {
        absolute(position, self.base_line, self.base_column)
    }

    /// Batch position of the statement's first token.
    pub fn start_position(&self) -> Position {
        Position::new(self.base_line + 1, self.base_column + 1)
    }
}

fn absolute(position: Position, base_line: usize, base_column: usize) -> Position {
    let column = if position.line == 1 {
        position.column + base_column
    } else {
        position.column
    };
    Position::new(position.line + base_line, column)
}

/// Splits `sql` into statement texts.
pub fn split(sql: &str, dialect: Dialect) -> Result<Vec<String>, ParseError> {
    Ok(split_statements(sql, dialect)?
        .into_iter()
        .map(|slice| slice.text)
        .collect())
}

/// Splits `sql` on top-level semicolons (and `GO` batch separators for T-SQL).
///
/// Semicolons inside parentheses, string literals, comments and procedural
/// `BEGIN ... END` blocks do not end a statement. Empty statements are dropped.
pub fn split_statements(sql: &str, dialect: Dialect) -> Result<Vec<StatementSlice>, ParseError> {
    let tokens = tokenize(sql, dialect)?;
    let mut slices = Vec::new();
    let mut current: Vec<LocatedToken> = Vec::new();
    let mut paren_depth = 0usize;
    let mut block_depth = 0usize;

    for (idx, token) in tokens.iter().enumerate() {
        match &token.token {
            Token::LParen => paren_depth += 1,
            Token::RParen => paren_depth = paren_depth.saturating_sub(1),
            Token::SemiColon if paren_depth == 0 && block_depth == 0 => {
                flush(sql, &mut current, &mut slices);
                continue;
            }
            Token::Word(word) if word.quote_style.is_none() => {
                if dialect == Dialect::Mssql
                    && word.value.eq_ignore_ascii_case("GO")
                    && is_alone_on_line(&tokens, idx)
                {
                    flush(sql, &mut current, &mut slices);
                    continue;
                }
                match word.keyword {
                    Keyword::BEGIN if opens_block(&tokens, idx) => block_depth += 1,
                    Keyword::CASE => block_depth += 1,
                    Keyword::END if block_depth > 0 && !closes_control_flow(&tokens, idx) => {
                        block_depth -= 1
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        current.push(token.clone());
    }
    flush(sql, &mut current, &mut slices);

    Ok(slices)
}

fn flush(sql: &str, current: &mut Vec<LocatedToken>, slices: &mut Vec<StatementSlice>) {
    let tokens = std::mem::take(current);
    let Some(first) = tokens.iter().position(|token| !token.is_trivia()) else {
        return;
    };
    let Some(last) = tokens.iter().rposition(|token| !token.is_trivia()) else {
        return;
    };

    let start = tokens[first].span.start;
    let end = tokens[last].span.end;
    let prefix = &sql[..start];
    let base_line = prefix.bytes().filter(|byte| *byte == b'\n').count();
    let line_start = prefix.rfind('\n').map_or(0, |idx| idx + 1);
    let base_column = sql[line_start..start].chars().count();

    slices.push(StatementSlice {
        text: sql[start..end].to_string(),
        range: start..end,
        base_line,
        base_column,
        tokens: tokens[first..=last].to_vec(),
    });
}

fn next_significant(tokens: &[LocatedToken], idx: usize) -> Option<&LocatedToken> {
    tokens[idx + 1..].iter().find(|token| !token.is_trivia())
}

/// `BEGIN;`, `BEGIN TRANSACTION` and friends start transactions, not blocks.
fn opens_block(tokens: &[LocatedToken], idx: usize) -> bool {
    match next_significant(tokens, idx) {
        None => false,
        Some(next) => !(matches!(next.token, Token::SemiColon)
            || next.is_keyword(Keyword::TRANSACTION)
            || next.is_keyword(Keyword::WORK)
            || next.is_word("TRAN")
            || next.is_word("DISTRIBUTED")),
    }
}

/// `END IF`, `END LOOP` and `END WHILE` close constructs that were not counted.
fn closes_control_flow(tokens: &[LocatedToken], idx: usize) -> bool {
    next_significant(tokens, idx).is_some_and(|next| {
        next.is_keyword(Keyword::IF)
            || next.is_word("LOOP")
            || next.is_word("WHILE")
            || next.is_word("REPEAT")
    })
}

fn is_alone_on_line(tokens: &[LocatedToken], idx: usize) -> bool {
    let line = tokens[idx].position.line;
    tokens
        .iter()
        .enumerate()
        .filter(|(other, token)| *other != idx && !token.is_trivia())
        .all(|(_, token)| token.position.line != line)
}

/// Parses every statement of `sql`.
///
/// The first statement that fails to parse aborts the batch with a
/// [`ParseError`] whose position is expressed in batch coordinates.
pub fn parse_statements(sql: &str, dialect: Dialect) -> Result<Vec<ParsedStatement>, ParseError> {
    let sqlparser_dialect = dialect.to_sqlparser_dialect();
    let mut parsed = Vec::new();

    for slice in split_statements(sql, dialect)? {
        let statements = Parser::parse_sql(sqlparser_dialect.as_ref(), &slice.text).map_err(|err| {
            ParseError::from(err)
                .with_dialect(dialect)
                .shifted(slice.base_line, slice.base_column)
        })?;

        // A slice without top-level separators yields one statement; keep any
        // extras the grammar split on its own, all sharing the slice offsets.
        for statement in statements {
            parsed.push(ParsedStatement {
                statement,
                text: slice.text.clone(),
                index: parsed.len(),
                range: slice.range.clone(),
                base_line: slice.base_line,
                base_column: slice.base_column,
            });
        }
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_top_level_semicolons() {
        let sql = "SELECT ';' FROM t; /* ; */ SELECT (1);\n\n";
        let texts = split(sql, Dialect::Postgres).unwrap();
        assert_eq!(texts, vec!["SELECT ';' FROM t", "SELECT (1)"]);
    }

    #[test]
    fn records_base_line_and_column() {
        let sql = "SELECT 1;\n\n  SELECT 2";
        let slices = split_statements(sql, Dialect::Mysql).unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[1].base_line, 2);
        assert_eq!(slices[1].base_column, 2);
        assert_eq!(&sql[slices[1].range.clone()], "SELECT 2");
    }

    #[test]
    fn splits_tsql_go_batches() {
        let sql = "SELECT 1\nGO\nSELECT 2\n";
        let texts = split(sql, Dialect::Mssql).unwrap();
        assert_eq!(texts, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn keeps_block_bodies_together() {
        let sql = "BEGIN\n  SELECT CASE WHEN a THEN 1 END FROM t;\nEND;\nSELECT 2;";
        let texts = split(sql, Dialect::Oracle).unwrap();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].ends_with("END"));
    }

    #[test]
    fn transaction_begin_does_not_open_block() {
        let texts = split("BEGIN; SELECT 1; COMMIT;", Dialect::Postgres).unwrap();
        assert_eq!(texts, vec!["BEGIN", "SELECT 1", "COMMIT"]);
    }

    #[test]
    fn parse_error_reports_batch_line() {
        let sql = "SELECT 1;\nSELECT a b c FROM t;";
        let err = parse_statements(sql, Dialect::Postgres).unwrap_err();
        assert_eq!(err.position.map(|pos| pos.line), Some(2));
        assert_eq!(err.dialect, Some(Dialect::Postgres));
    }

    #[test]
    fn maps_relative_positions_to_batch() {
        let sql = "SELECT 1;\n\n   SELECT a\nFROM t";
        let parsed = parse_statements(sql, Dialect::Postgres).unwrap();
        let second = &parsed[1];
        assert_eq!(second.index, 1);
        assert_eq!(second.start_position(), Position::new(3, 4));
        assert_eq!(
            second.absolute_position(Position::new(1, 8)),
            Position::new(3, 11)
        );
        assert_eq!(
            second.absolute_position(Position::new(2, 6)),
            Position::new(4, 6)
        );
    }

    #[test]
    fn empty_input_yields_no_statements() {
        assert!(parse_statements("  -- only a comment\n;", Dialect::Mysql)
            .unwrap()
            .is_empty());
    }
}
