//! statement.insert.row-limit: cap the rows a single INSERT ... VALUES adds.

use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, RuleError};
use crate::types::advice_codes;
use serde::Deserialize;
use sqlparser::ast::SetExpr;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Payload {
    number: usize,
}

impl Default for Payload {
    fn default() -> Self {
        Self { number: 1000 }
    }
}

pub struct InsertRowLimit {
    base: RuleBase,
    max_rows: usize,
}

impl InsertRowLimit {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        let payload: Payload = ctx.payload()?;
        Ok(Box::new(Self {
            base: ctx.rule_base(),
            max_rows: payload.number,
        }))
    }
}

impl Rule for InsertRowLimit {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        kind == NodeKind::Insert
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        // Zero disables the check.
        if self.max_rows == 0 {
            return Ok(());
        }
        let Node::Insert(insert) = node else {
            return Ok(());
        };
        let Some(source) = &insert.source else {
            return Ok(());
        };
        let SetExpr::Values(values) = source.body.as_ref() else {
            return Ok(());
        };
        let rows = values.rows.len();
        if rows > self.max_rows {
            let content = format!(
                "The statement \"{}\" inserts {rows} rows. The count exceeds {}.",
                self.base.statement_text(),
                self.max_rows
            );
            self.base
                .report(advice_codes::INSERT_TOO_MANY_ROWS, content, node.position());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::advisor::config::RuleDescriptor;
    use crate::advisor::rule::{CheckContext, RuleKind, RuleLevel};
    use crate::advisor::rules::testing::Harness;
    use crate::error::ConfigError;
    use crate::types::{ChangeType, Dialect};
    use serde_json::json;

    fn run_with_limit(limit: usize, sql: &str) -> usize {
        Harness {
            payload: json!({ "number": limit }),
            ..Harness::default()
        }
        .run(RuleKind::StatementInsertRowLimit, sql)
        .len()
    }

    #[test]
    fn counts_value_rows() {
        assert_eq!(run_with_limit(2, "INSERT INTO t (a) VALUES (1), (2), (3)"), 1);
        assert_eq!(run_with_limit(3, "INSERT INTO t (a) VALUES (1), (2), (3)"), 0);
        assert_eq!(run_with_limit(0, "INSERT INTO t (a) VALUES (1), (2), (3)"), 0);
    }

    #[test]
    fn rejects_non_numeric_payload() {
        let descriptor = RuleDescriptor::new(RuleKind::StatementInsertRowLimit, RuleLevel::Error)
            .with_payload(json!({ "number": "lots" }));
        let context = CheckContext {
            dialect: Dialect::Postgres,
            descriptor: &descriptor,
            statements: &[],
            current_database: None,
            current_schema: None,
            schema: None,
            final_schema: None,
            change_type: ChangeType::Dml,
        };
        assert!(matches!(
            super::InsertRowLimit::create(&context),
            Err(ConfigError::InvalidPayload { .. })
        ));
    }
}
