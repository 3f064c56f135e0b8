//! statement.where.no-leading-wildcard-like: `LIKE '%...'` defeats indexes.

use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, RuleError};
use crate::types::advice_codes;
use sqlparser::ast::{Expr, Value, ValueWithSpan};

pub struct NoLeadingWildcardLike {
    base: RuleBase,
    reported: bool,
}

impl NoLeadingWildcardLike {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self {
            base: ctx.rule_base(),
            reported: false,
        }))
    }
}

impl Rule for NoLeadingWildcardLike {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        kind == NodeKind::Expr
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        // One finding per statement is enough to point at the problem.
        if self.reported {
            return Ok(());
        }
        let Node::Expr(Expr::Like { pattern, .. } | Expr::ILike { pattern, .. }) = node else {
            return Ok(());
        };
        if has_leading_wildcard(pattern) {
            self.reported = true;
            let content = format!(
                "\"{}\" uses leading wildcard LIKE",
                self.base.statement_text()
            );
            self.base.report(
                advice_codes::STATEMENT_LEADING_WILDCARD_LIKE,
                content,
                node.position(),
            );
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.reported = false;
    }
}

fn has_leading_wildcard(pattern: &Expr) -> bool {
    match pattern {
        Expr::Value(ValueWithSpan {
            value: Value::SingleQuotedString(text) | Value::DoubleQuotedString(text),
            ..
        }) => text.starts_with('%'),
        Expr::Nested(inner) | Expr::Collate { expr: inner, .. } => has_leading_wildcard(inner),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use crate::advisor::rule::RuleKind;
    use crate::advisor::rules::testing::run;
    use rstest::rstest;

    #[rstest]
    #[case("SELECT a FROM t WHERE a LIKE '%abc'", 1)]
    #[case("SELECT a FROM t WHERE a ILIKE '%abc' OR b LIKE '%x'", 1)]
    #[case("DELETE FROM t WHERE a LIKE 'abc%'", 0)]
    #[case("SELECT a FROM t WHERE a = '%abc'", 0)]
    fn flags_leading_percent(#[case] sql: &str, #[case] expected: usize) {
        assert_eq!(
            run(RuleKind::StatementNoLeadingWildcardLike, sql).len(),
            expected
        );
    }

    #[test]
    fn state_does_not_leak_between_statements() {
        let advice = run(
            RuleKind::StatementNoLeadingWildcardLike,
            "SELECT a FROM t WHERE a LIKE '%x';\nSELECT a FROM t WHERE a LIKE '%y'",
        );
        assert_eq!(advice.len(), 2);
        assert_eq!(advice[1].line, Some(2));
    }
}
