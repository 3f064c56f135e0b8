//! index.no-duplicate-column: an index must not list the same column twice.

use crate::advisor::helpers::{index_column_name, unquote};
use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, RuleError};
use crate::types::{advice_codes, Dialect};
use sqlparser::ast::TableConstraint;

pub struct IndexNoDuplicateColumn {
    base: RuleBase,
    dialect: Dialect,
    tables: Vec<String>,
}

impl IndexNoDuplicateColumn {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self {
            base: ctx.rule_base(),
            dialect: ctx.dialect,
            tables: Vec::new(),
        }))
    }

    fn check(&mut self, kind: &str, index: &str, table: &str, columns: &[String], node: Node<'_>) {
        let duplicate = columns
            .iter()
            .enumerate()
            .find(|(idx, column)| columns[..*idx].contains(column))
            .map(|(_, column)| column.clone());
        if let Some(column) = duplicate {
            let content = format!("{kind} `{index}` has duplicate column `{table}`.`{column}`");
            self.base.report(
                advice_codes::DUPLICATE_COLUMN_IN_INDEX,
                content,
                node.position(),
            );
        }
    }
}

impl Rule for IndexNoDuplicateColumn {
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
                let columns: Vec<String> = index
                    .columns
                    .iter()
                    .map(|column| index_column_name(column, self.dialect))
                    .collect();
                let name = index
                    .name
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                self.check(
                    "Index",
                    &name,
                    &index.table_name.to_string(),
                    &columns,
                    node,
                );
            }
            Node::TableConstraint(constraint) => {
                let (kind, name, columns): (&str, _, Vec<String>) = match constraint {
                    TableConstraint::PrimaryKey { name, columns, .. } => (
                        "PRIMARY KEY",
                        name,
                        columns
                            .iter()
                            .map(|column| index_column_name(column, self.dialect))
                            .collect(),
                    ),
                    TableConstraint::Unique { name, columns, .. } => (
                        "UNIQUE KEY",
                        name,
                        columns
                            .iter()
                            .map(|column| index_column_name(column, self.dialect))
                            .collect(),
                    ),
                    TableConstraint::Index { name, columns, .. } => (
                        "INDEX",
                        name,
                        columns
                            .iter()
                            .map(|column| self.dialect.fold_unquoted(unquote(&column.to_string())))
                            .collect(),
                    ),
                    _ => return Ok(()),
                };
                let name = name.as_ref().map(|ident| ident.value.clone()).unwrap_or_default();
                let table = self.tables.last().cloned().unwrap_or_default();
                self.check(kind, &name, &table, &columns, node);
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
    use crate::advisor::rules::testing::{run, run_with};
    use crate::types::Dialect;

    #[test]
    fn flags_duplicate_index_column() {
        let advice = run(RuleKind::IndexNoDuplicateColumn, "CREATE INDEX idx ON t (a, b, A)");
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].content, "Index `idx` has duplicate column `t`.`a`");
    }

    #[test]
    fn flags_duplicate_constraint_column() {
        let advice = run_with(
            Dialect::Mysql,
            RuleKind::IndexNoDuplicateColumn,
            "CREATE TABLE t (a int, b int, PRIMARY KEY (a, b, a))",
        );
        assert_eq!(advice.len(), 1);
        assert!(advice[0].content.starts_with("PRIMARY KEY"));
    }

    #[test]
    fn distinct_columns_pass() {
        assert!(run(RuleKind::IndexNoDuplicateColumn, "CREATE INDEX idx ON t (a, b)").is_empty());
    }
}
