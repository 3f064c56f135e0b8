//! column.no-null: columns must be declared NOT NULL.
//!
//! Primary key columns are implicitly NOT NULL, so a column is only reported
//! once its table scope closes and every primary key has been seen.

use crate::advisor::helpers::{is_primary_key_option, primary_key_columns};
use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, Position, RuleError};
use crate::types::{advice_codes, Dialect};
use sqlparser::ast::ColumnOption;

struct PendingColumn {
    name: String,
    display: String,
    nullable: bool,
    position: Option<Position>,
}

struct Scope {
    table: String,
    columns: Vec<PendingColumn>,
    primary_key: Vec<String>,
}

pub struct ColumnNoNull {
    base: RuleBase,
    dialect: Dialect,
    scopes: Vec<Scope>,
}

impl ColumnNoNull {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self {
            base: ctx.rule_base(),
            dialect: ctx.dialect,
            scopes: Vec::new(),
        }))
    }

    fn current_column(&mut self) -> Option<&mut PendingColumn> {
        self.scopes.last_mut()?.columns.last_mut()
    }
}

impl Rule for ColumnNoNull {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        matches!(
            kind,
            NodeKind::CreateTable
                | NodeKind::AlterTable
                | NodeKind::ColumnDef
                | NodeKind::ColumnOption
                | NodeKind::TableConstraint
        )
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        match node {
            Node::CreateTable(create) => self.scopes.push(Scope {
                table: create.name.to_string(),
                columns: Vec::new(),
                primary_key: Vec::new(),
            }),
            Node::AlterTable { name, .. } => self.scopes.push(Scope {
                table: name.to_string(),
                columns: Vec::new(),
                primary_key: Vec::new(),
            }),
            Node::ColumnDef(column) => {
                let name = self.dialect.normalize_identifier(&column.name);
                if let Some(scope) = self.scopes.last_mut() {
                    scope.columns.push(PendingColumn {
                        name,
                        display: column.name.value.clone(),
                        nullable: true,
                        position: node.position(),
                    });
                }
            }
            Node::ColumnOption(option) => {
                let not_null = matches!(option.option, ColumnOption::NotNull)
                    || is_primary_key_option(&option.option);
                if not_null {
                    if let Some(column) = self.current_column() {
                        column.nullable = false;
                    }
                }
            }
            Node::TableConstraint(constraint) => {
                if let Some(columns) = primary_key_columns(constraint, self.dialect) {
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.primary_key.extend(columns);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn on_exit(&mut self, node: Node<'_>, kind: NodeKind) -> Result<(), RuleError> {
        if !matches!(node, Node::CreateTable(_) | Node::AlterTable { .. }) {
            return Ok(());
        }
        let scope = self.scopes.pop().ok_or(RuleError::ScopeUnderflow {
            kind: kind.as_str(),
        })?;
        for column in scope.columns {
            let in_primary_key = scope
                .primary_key
                .iter()
                .any(|key| self.dialect.names_match(key, &column.name));
            if column.nullable && !in_primary_key {
                self.base.report(
                    advice_codes::COLUMN_CANNOT_NULL,
                    format!("`{}`.`{}` cannot have NULL value", scope.table, column.display),
                    column.position,
                );
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.scopes.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::advisor::rule::RuleKind;
    use crate::advisor::rules::testing::run;

    #[test]
    fn reports_nullable_columns_at_their_line() {
        let sql = "CREATE TABLE t (\n  id int,\n  name text NOT NULL,\n  note text,\n  PRIMARY KEY (id)\n)";
        let advice = run(RuleKind::ColumnNoNull, sql);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].content, "`t`.`note` cannot have NULL value");
        assert_eq!(advice[0].line, Some(4));
    }

    #[test]
    fn added_columns_are_checked() {
        let advice = run(RuleKind::ColumnNoNull, "ALTER TABLE t ADD COLUMN c int");
        assert_eq!(advice.len(), 1);
    }

    #[test]
    fn inline_primary_key_is_not_null() {
        assert!(run(RuleKind::ColumnNoNull, "CREATE TABLE t (id int PRIMARY KEY)").is_empty());
    }
}
