//! Located tokens: sqlparser tokens paired with byte spans over the source.

use crate::error::{ParseError, Position};
use crate::types::Dialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, TokenWithSpan, Tokenizer, Whitespace};
use std::ops::Range;

/// A token with its byte range and 1-based start position in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedToken {
    pub token: Token,
    pub span: Range<usize>,
    pub position: Position,
}

impl LocatedToken {
    /// Whitespace and comments.
    pub fn is_trivia(&self) -> bool {
        matches!(self.token, Token::Whitespace(_))
    }

    pub fn is_line_comment(&self) -> bool {
        matches!(
            self.token,
            Token::Whitespace(Whitespace::SingleLineComment { .. })
        )
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(&self.token, Token::Word(word) if word.keyword == keyword)
    }

    /// Case-insensitive match against an unquoted word, keyword or not.
    pub fn is_word(&self, text: &str) -> bool {
        matches!(&self.token, Token::Word(word) if word.quote_style.is_none() && word.value.eq_ignore_ascii_case(text))
    }
}

/// Tokenizes `sql` and resolves every token to a byte span.
///
/// Tokens whose location cannot be mapped back to the source are dropped.
pub fn tokenize(sql: &str, dialect: Dialect) -> Result<Vec<LocatedToken>, ParseError> {
    let sqlparser_dialect = dialect.to_sqlparser_dialect();
    let mut tokenizer = Tokenizer::new(sqlparser_dialect.as_ref(), sql);
    let tokens: Vec<TokenWithSpan> = tokenizer
        .tokenize_with_location()
        .map_err(|err| ParseError::from(err).with_dialect(dialect))?;

    let index = LineIndex::new(sql);
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        if matches!(token.token, Token::EOF) {
            continue;
        }
        let start_line = token.span.start.line as usize;
        let start_column = token.span.start.column as usize;
        let Some(start) = index.offset(start_line, start_column) else {
            continue;
        };
        let end = index
            .offset(token.span.end.line as usize, token.span.end.column as usize)
            .unwrap_or(sql.len());
        out.push(LocatedToken {
            token: token.token,
            span: start..end.max(start),
            position: Position::new(start_line, start_column),
        });
    }

    Ok(out)
}

/// Precomputed line starts for repeated line/column to byte conversions.
pub struct LineIndex<'a> {
    sql: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(sql: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            sql.bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(idx, _)| idx + 1),
        );
        Self { sql, line_starts }
    }

    /// Converts a 1-based line and character column into a byte offset.
    pub fn offset(&self, line: usize, column: usize) -> Option<usize> {
        if line == 0 || column == 0 {
            return None;
        }
        let line_start = *self.line_starts.get(line - 1)?;
        let line_end = self
            .line_starts
            .get(line)
            .map_or(self.sql.len(), |next| next - 1);
        let line_slice = self.sql.get(line_start..line_end)?;

        // sqlparser reports columns in characters, so walk char_indices to
        // convert the 1-based column into a byte offset.
        let mut current_column = 1;
        for (rel_offset, _) in line_slice.char_indices() {
            if current_column == column {
                return Some(line_start + rel_offset);
            }
            current_column += 1;
        }

        if column == current_column {
            return Some(line_end);
        }

        None
    }
}

/// Calculates the byte offset for a given line and column in SQL text.
pub fn line_col_to_offset(sql: &str, line: usize, column: usize) -> Option<usize> {
    LineIndex::new(sql).offset(line, column)
}

/// Converts a byte offset into a 1-based (line, column) pair.
pub fn offset_to_position(sql: &str, offset: usize) -> Position {
    let offset = offset.min(sql.len());
    let mut line = 1usize;
    let mut column = 1usize;

    for (i, ch) in sql.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    Position::new(line, column)
}
