//! statement.disallow-order-by: ORDER BY in DELETE.
//!
//! The MySQL grammar drops `ORDER BY` on UPDATE, so only DELETE is checked.

use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, RuleError};
use crate::types::advice_codes;

pub struct DisallowOrderBy {
    base: RuleBase,
}

impl DisallowOrderBy {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self {
            base: ctx.rule_base(),
        }))
    }
}

impl Rule for DisallowOrderBy {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        kind == NodeKind::Delete
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        let Node::Delete(delete) = node else {
            return Ok(());
        };
        if delete.order_by.is_empty() {
            return Ok(());
        }
        let content = format!(
            "ORDER BY clause in DELETE statement is not allowed, related statement: \"{}\"",
            self.base.statement_text()
        );
        self.base
            .report(advice_codes::DELETE_USE_ORDER_BY, content, node.position());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::advisor::rule::RuleKind;
    use crate::advisor::rules::testing::run_with;
    use crate::types::{advice_codes, Dialect};

    #[test]
    fn flags_delete_order_by() {
        let advice = run_with(
            Dialect::Mysql,
            RuleKind::StatementDisallowOrderBy,
            "DELETE FROM t WHERE a = 1 ORDER BY b LIMIT 1;\nDELETE FROM t WHERE a = 2",
        );
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::DELETE_USE_ORDER_BY);
    }
}
