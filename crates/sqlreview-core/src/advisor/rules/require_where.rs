//! statement.where.require: UPDATE and DELETE must carry a WHERE clause.

use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, RuleError};
use crate::types::advice_codes;

pub struct RequireWhere {
    base: RuleBase,
}

impl RequireWhere {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self {
            base: ctx.rule_base(),
        }))
    }
}

impl Rule for RequireWhere {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        matches!(kind, NodeKind::Update | NodeKind::Delete)
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        let missing = match node {
            Node::Update(update) => update.selection.is_none(),
            Node::Delete(delete) => delete.selection.is_none(),
            _ => false,
        };
        if missing {
            let content = format!(
                "\"{}\" requires WHERE clause",
                self.base.statement_text()
            );
            self.base
                .report(advice_codes::STATEMENT_NO_WHERE, content, node.position());
        }
        Ok(())
    }
}
