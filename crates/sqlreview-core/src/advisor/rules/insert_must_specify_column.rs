//! statement.insert.must-specify-column: INSERT needs an explicit column list.

use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, RuleError};
use crate::types::advice_codes;

pub struct InsertMustSpecifyColumn {
    base: RuleBase,
}

impl InsertMustSpecifyColumn {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self {
            base: ctx.rule_base(),
        }))
    }
}

impl Rule for InsertMustSpecifyColumn {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        kind == NodeKind::Insert
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        let Node::Insert(insert) = node else {
            return Ok(());
        };
        // `INSERT ... SET a = 1` names its columns in the assignments.
        if insert.columns.is_empty() && insert.assignments.is_empty() {
            let content = format!(
                "The INSERT statement must specify columns but \"{}\" does not",
                self.base.statement_text()
            );
            self.base.report(
                advice_codes::INSERT_NOT_SPECIFY_COLUMN,
                content,
                node.position(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::advisor::rule::RuleKind;
    use crate::advisor::rules::testing::run;
    use rstest::rstest;

    #[rstest]
    #[case("INSERT INTO t VALUES (1, 2)", 1)]
    #[case("INSERT INTO t SELECT * FROM u", 1)]
    #[case("INSERT INTO t (a, b) VALUES (1, 2)", 0)]
    fn requires_column_list(#[case] sql: &str, #[case] expected: usize) {
        assert_eq!(
            run(RuleKind::StatementInsertMustSpecifyColumn, sql).len(),
            expected
        );
    }
}
