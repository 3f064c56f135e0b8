//! statement.select.no-select-all: disallow `SELECT *`.

use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, RuleError};
use crate::types::advice_codes;
use sqlparser::ast::SelectItem;

pub struct NoSelectAll {
    base: RuleBase,
}

impl NoSelectAll {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self {
            base: ctx.rule_base(),
        }))
    }
}

impl Rule for NoSelectAll {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        kind == NodeKind::Select
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        let Node::Select(select) = node else {
            return Ok(());
        };
        let uses_wildcard = select.projection.iter().any(|item| {
            matches!(
                item,
                SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..)
            )
        });
        if uses_wildcard {
            let content = format!("\"{}\" uses SELECT all", self.base.statement_text());
            self.base
                .report(advice_codes::STATEMENT_SELECT_ALL, content, node.position());
        }
        Ok(())
    }
}
