//! Oracle row limits: `FETCH NEXT n ROWS ONLY` on 12c and later, a `ROWNUM`
//! wrapper before that.

use super::{rewrite_or_fallback, trim_statement, wrap, TokenRewriter};
use crate::advisor::helpers::object_base_name;
use crate::error::RewriteError;
use crate::parser::{parse_statements, tokenize, LocatedToken};
use crate::types::Dialect;
use regex::Regex;
use sqlparser::ast::{
    Expr, GroupByExpr, LimitClause, Query, SelectItem, SetExpr, Statement, TableFactor, Value,
    ValueWithSpan,
};
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::Token;
use std::sync::OnceLock;

/// Major and minor release parsed from a server banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OracleVersion {
    pub major: u32,
    pub minor: u32,
}

impl OracleVersion {
    /// The last release without the row-limiting clause.
    pub const LEGACY: Self = Self::new(11, 2);

    const FIRST_MODERN: Self = Self::new(12, 1);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Reads the first `major.minor` pair of a version banner such as
    /// `Oracle Database 19c Enterprise Edition Release 19.0.0.0.0`.
    pub fn parse(banner: &str) -> Option<Self> {
        static VERSION: OnceLock<Option<Regex>> = OnceLock::new();
        let re = VERSION
            .get_or_init(|| Regex::new(r"(\d+)\.(\d+)").ok())
            .as_ref()?;
        let caps = re.captures(banner)?;
        let major = caps.get(1)?.as_str().parse().ok()?;
        let minor = caps.get(2)?.as_str().parse().ok()?;
        Some(Self::new(major, minor))
    }

    /// Supports `FETCH { FIRST | NEXT } n ROWS ONLY`.
    pub fn is_modern(&self) -> bool {
        *self >= Self::FIRST_MODERN
    }
}

/// Caps `sql` at `max_rows` rows.
///
/// Modern servers get an in-place `FETCH NEXT` clause, lowering an existing
/// one when it asks for more rows than the cap. Anything the precise rewrite
/// cannot handle, and every pre-12c server, gets the `ROWNUM` wrapper.
pub fn limit_oracle_query(sql: &str, max_rows: u64, version: OracleVersion) -> String {
    let sql = trim_statement(sql);
    if !version.is_modern() {
        return wrap_rownum(sql, max_rows);
    }
    rewrite_or_fallback(sql, max_rows, fetch_rewrite, wrap_rownum)
}

fn wrap_rownum(sql: &str, max_rows: u64) -> String {
    wrap(
        sql,
        Dialect::Oracle,
        "SELECT * FROM ",
        &format!(" WHERE ROWNUM <= {max_rows}"),
    )
}

fn single_query(sql: &str) -> Result<Box<Query>, RewriteError> {
    let mut statements = parse_statements(sql, Dialect::Oracle)?;
    if statements.len() != 1 {
        return Err(RewriteError::Unsupported(format!(
            "expected one statement, found {}",
            statements.len()
        )));
    }
    match statements.remove(0).statement {
        Statement::Query(query) => Ok(query),
        other => Err(RewriteError::Unsupported(format!(
            "not a query: {}",
            statement_head(&other)
        ))),
    }
}

fn statement_head(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Tokens outside any parentheses, trivia removed.
fn top_level_tokens(tokens: &[LocatedToken]) -> Vec<&LocatedToken> {
    let mut depth = 0usize;
    let mut out = Vec::new();
    for token in tokens.iter().filter(|token| !token.is_trivia()) {
        match token.token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(token),
            _ => {}
        }
    }
    out
}

fn fetch_rewrite(sql: &str, max_rows: u64) -> Result<String, RewriteError> {
    let query = single_query(sql)?;

    match &query.limit_clause {
        None | Some(LimitClause::LimitOffset { limit: None, .. }) => {}
        Some(_) => return Err(RewriteError::Unsupported("LIMIT clause".to_string())),
    }
    if !query.locks.is_empty() {
        return Err(RewriteError::Unsupported("FOR UPDATE".to_string()));
    }

    let tokens = tokenize(sql, Dialect::Oracle)?;
    let mut rewriter = TokenRewriter::new(sql);

    match &query.fetch {
        Some(fetch) if fetch.with_ties || fetch.percent => {
            return Err(RewriteError::Unsupported(
                "FETCH with TIES or PERCENT".to_string(),
            ));
        }
        // FETCH FIRST ROW ONLY
        Some(fetch) if fetch.quantity.is_none() => {}
        Some(fetch) => {
            let requested = match &fetch.quantity {
                Some(Expr::Value(ValueWithSpan {
                    value: Value::Number(number, _),
                    ..
                })) => number.parse::<u64>().map_err(|_| {
                    RewriteError::Unsupported(format!("FETCH quantity {number}"))
                })?,
                _ => {
                    return Err(RewriteError::Unsupported(
                        "FETCH quantity is not a literal".to_string(),
                    ))
                }
            };
            if requested > max_rows {
                let top = top_level_tokens(&tokens);
                let quantity = fetch_quantity_token(&top).ok_or_else(|| {
                    RewriteError::Unsupported("FETCH clause not found".to_string())
                })?;
                rewriter.replace(quantity.span.clone(), max_rows.to_string());
            }
        }
        None => {
            let last = tokens
                .iter()
                .rev()
                .find(|token| !token.is_trivia())
                .ok_or_else(|| RewriteError::Unsupported("empty statement".to_string()))?;
            rewriter.insert_after(last.span.end, format!(" FETCH NEXT {max_rows} ROWS ONLY"));
        }
    }

    rewriter.render()
}

/// The number token of the outermost `FETCH FIRST|NEXT n`.
fn fetch_quantity_token<'t>(top: &[&'t LocatedToken]) -> Option<&'t LocatedToken> {
    let fetch = top
        .iter()
        .rposition(|token| token.is_keyword(Keyword::FETCH))?;
    let mut rest = top[fetch + 1..].iter();
    let direction = rest.next()?;
    if !(direction.is_keyword(Keyword::FIRST) || direction.is_keyword(Keyword::NEXT)) {
        return None;
    }
    rest.next()
        .filter(|token| matches!(token.token, Token::Number(..)))
        .copied()
}

/// True for a lone `SELECT <expressions> FROM DUAL`, which returns one row.
///
/// Any clause that could widen or reshape the result, a wildcard, or a
/// subquery anywhere in the statement disqualifies it.
pub fn should_skip_limit(sql: &str) -> bool {
    let sql = trim_statement(sql);
    let Ok(query) = single_query(sql) else {
        return false;
    };
    if query.with.is_some()
        || query.order_by.is_some()
        || query.limit_clause.is_some()
        || query.fetch.is_some()
        || !query.locks.is_empty()
    {
        return false;
    }
    let SetExpr::Select(select) = query.body.as_ref() else {
        return false;
    };
    let no_grouping = match &select.group_by {
        GroupByExpr::Expressions(exprs, _) => exprs.is_empty(),
        GroupByExpr::All(_) => false,
    };
    if select.distinct.is_some()
        || select.selection.is_some()
        || select.having.is_some()
        || !no_grouping
        || select.projection.is_empty()
    {
        return false;
    }
    if select.projection.iter().any(|item| {
        matches!(
            item,
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..)
        )
    }) {
        return false;
    }

    let [from] = select.from.as_slice() else {
        return false;
    };
    if !from.joins.is_empty() {
        return false;
    }
    let TableFactor::Table { name, args: None, .. } = &from.relation else {
        return false;
    };
    if name.0.len() != 1 || object_base_name(name, Dialect::Oracle).as_deref() != Some("DUAL") {
        return false;
    }

    // One SELECT keyword means no scalar subquery hides in the projection.
    tokenize(sql, Dialect::Oracle).is_ok_and(|tokens| {
        tokens
            .iter()
            .filter(|token| token.is_keyword(Keyword::SELECT))
            .count()
            == 1
    })
}
