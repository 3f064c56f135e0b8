//! statement.disallow-limit: LIMIT in UPDATE, DELETE and INSERT ... SELECT.

use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, RuleError};
use crate::types::advice_codes;

pub struct DisallowLimit {
    base: RuleBase,
}

impl DisallowLimit {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self {
            base: ctx.rule_base(),
        }))
    }
}

impl Rule for DisallowLimit {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        matches!(kind, NodeKind::Update | NodeKind::Delete | NodeKind::Insert)
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        let (code, statement) = match node {
            Node::Update(update) if update.limit.is_some() => {
                (advice_codes::UPDATE_USE_LIMIT, "UPDATE")
            }
            Node::Delete(delete) if delete.limit.is_some() => {
                (advice_codes::DELETE_USE_LIMIT, "DELETE")
            }
            Node::Insert(insert)
                if insert
                    .source
                    .as_ref()
                    .is_some_and(|query| query.limit_clause.is_some()) =>
            {
                (advice_codes::INSERT_USE_LIMIT, "INSERT")
            }
            _ => return Ok(()),
        };
        let content = format!(
            "LIMIT clause in {statement} statement is not allowed, related statement: \"{}\"",
            self.base.statement_text()
        );
        self.base.report(code, content, node.position());
        Ok(())
    }
}
