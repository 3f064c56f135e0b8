//! index.key-number-limit: cap the number of key parts in an index.

use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, RuleError};
use crate::types::advice_codes;
use serde::Deserialize;
use sqlparser::ast::TableConstraint;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Payload {
    number: usize,
}

impl Default for Payload {
    fn default() -> Self {
        Self { number: 5 }
    }
}

pub struct IndexKeyNumberLimit {
    base: RuleBase,
    max_keys: usize,
    tables: Vec<String>,
}

impl IndexKeyNumberLimit {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        let payload: Payload = ctx.payload()?;
        Ok(Box::new(Self {
            base: ctx.rule_base(),
            max_keys: payload.number,
            tables: Vec::new(),
        }))
    }

    fn check(&mut self, index: &str, table: &str, keys: usize, node: Node<'_>) {
        if self.max_keys > 0 && keys > self.max_keys {
            let content = format!(
                "The number of index `{index}` in table `{table}` should be not greater than {}",
                self.max_keys
            );
            self.base.report(
                advice_codes::INDEX_KEY_NUMBER_EXCEEDS_LIMIT,
                content,
                node.position(),
            );
        }
    }
}

impl Rule for IndexKeyNumberLimit {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        matches!(
            kind,
            NodeKind::CreateTable
                | NodeKind::AlterTable
                | NodeKind::TableConstraint
                | NodeKind::CreateIndex
        )
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        match node {
            Node::CreateTable(create) => self.tables.push(create.name.to_string()),
            Node::AlterTable { name, .. } => self.tables.push(name.to_string()),
            Node::CreateIndex(index) => {
                let name = index
                    .name
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                self.check(
                    &name,
                    &index.table_name.to_string(),
                    index.columns.len(),
                    node,
                );
            }
            Node::TableConstraint(constraint) => {
                let (name, keys) = match constraint {
                    TableConstraint::PrimaryKey { name, columns, .. }
                    | TableConstraint::Unique { name, columns, .. } => (name, columns.len()),
                    TableConstraint::Index { name, columns, .. } => (name, columns.len()),
                    _ => return Ok(()),
                };
                let name = name.as_ref().map(|ident| ident.value.clone()).unwrap_or_default();
                let table = self.tables.last().cloned().unwrap_or_default();
                self.check(&name, &table, keys, node);
            }
            _ => {}
        }
        Ok(())
    }

    fn on_exit(&mut self, node: Node<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if matches!(node, Node::CreateTable(_) | Node::AlterTable { .. }) {
            self.tables.pop().ok_or(RuleError::ScopeUnderflow {
                kind: kind.as_str(),
            })?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.tables.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::advisor::rule::RuleKind;
    use crate::advisor::rules::testing::Harness;
    use serde_json::json;

    fn run(sql: &str) -> usize {
        Harness {
            payload: json!({ "number": 2 }),
            ..Harness::default()
        }
        .run(RuleKind::IndexKeyNumberLimit, sql)
        .len()
    }

    #[test]
    fn create_index_over_limit() {
        assert_eq!(run("CREATE INDEX idx ON t (a, b, c)"), 1);
        assert_eq!(run("CREATE INDEX idx ON t (a, b)"), 0);
    }

    #[test]
    fn table_constraints_over_limit() {
        assert_eq!(
            run("CREATE TABLE t (a int, b int, c int, PRIMARY KEY (a, b, c), UNIQUE (a))"),
            1
        );
        assert_eq!(run("ALTER TABLE t ADD CONSTRAINT uk UNIQUE (a, b, c)"), 1);
    }
}
