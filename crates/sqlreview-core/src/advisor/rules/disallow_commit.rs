//! statement.disallow-commit: explicit COMMIT inside a change script.

use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, RuleError};
use crate::types::advice_codes;

pub struct DisallowCommit {
    base: RuleBase,
}

impl DisallowCommit {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self {
            base: ctx.rule_base(),
        }))
    }
}

impl Rule for DisallowCommit {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        kind == NodeKind::Commit
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        let content = format!(
            "Commit is not allowed, related statement: \"{}\"",
            self.base.statement_text()
        );
        self.base.report(
            advice_codes::STATEMENT_DISALLOW_COMMIT,
            content,
            node.position(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::advisor::rule::RuleKind;
    use crate::advisor::rules::testing::run_with;
    use crate::types::Dialect;

    #[test]
    fn flags_commit() {
        let advice = run_with(
            Dialect::Mysql,
            RuleKind::StatementDisallowCommit,
            "INSERT INTO t (a) VALUES (1);\nCOMMIT;",
        );
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].line, Some(2));
        assert_eq!(
            advice[0].content,
            "Commit is not allowed, related statement: \"COMMIT\""
        );
    }
}
