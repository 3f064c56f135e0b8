//! table.no-foreign-key: tables must not declare foreign keys.

use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, Position, RuleError};
use crate::types::advice_codes;
use sqlparser::ast::{ColumnOption, ObjectName, TableConstraint};

struct Scope {
    table: String,
    first_foreign_key: Option<Position>,
}

pub struct NoForeignKey {
    base: RuleBase,
    scopes: Vec<Scope>,
}

impl NoForeignKey {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self {
            base: ctx.rule_base(),
            scopes: Vec::new(),
        }))
    }

    fn open(&mut self, name: &ObjectName) {
        self.scopes.push(Scope {
            table: name.to_string(),
            first_foreign_key: None,
        });
    }

    fn mark(&mut self, position: Option<Position>) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.first_foreign_key.is_none() {
                scope.first_foreign_key = Some(position.unwrap_or(Position::new(1, 1)));
            }
        }
    }
}

impl Rule for NoForeignKey {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        matches!(
            kind,
            NodeKind::CreateTable
                | NodeKind::AlterTable
                | NodeKind::ColumnOption
                | NodeKind::TableConstraint
        )
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        match node {
            Node::CreateTable(create) => self.open(&create.name),
            Node::AlterTable { name, .. } => self.open(name),
            Node::ColumnOption(option)
                if matches!(option.option, ColumnOption::ForeignKey { .. }) =>
            {
                self.mark(node.position())
            }
            Node::TableConstraint(TableConstraint::ForeignKey { .. }) => {
                self.mark(node.position())
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
        if let Some(position) = scope.first_foreign_key {
            self.base.report(
                advice_codes::TABLE_HAS_FK,
                format!("Foreign key is not allowed in the table `{}`", scope.table),
                Some(position),
            );
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
    fn reports_first_foreign_key_once_per_table() {
        let sql = "CREATE TABLE t (\n  id int PRIMARY KEY,\n  u_id int REFERENCES u (id),\n  v_id int,\n  FOREIGN KEY (v_id) REFERENCES v (id)\n)";
        let advice = run(RuleKind::TableNoForeignKey, sql);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].line, Some(3));
        assert_eq!(advice[0].content, "Foreign key is not allowed in the table `t`");
    }

    #[test]
    fn alter_add_foreign_key_is_reported() {
        let advice = run(
            RuleKind::TableNoForeignKey,
            "ALTER TABLE t ADD CONSTRAINT fk FOREIGN KEY (u_id) REFERENCES u (id)",
        );
        assert_eq!(advice.len(), 1);
    }

    #[test]
    fn tables_without_foreign_keys_pass() {
        assert!(run(RuleKind::TableNoForeignKey, "CREATE TABLE t (id int PRIMARY KEY)").is_empty());
    }
}
