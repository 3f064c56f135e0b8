//! column.required: created tables carry a configured set of columns, and
//! ALTER TABLE must not drop them.

use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, RuleError};
use crate::types::{advice_codes, Dialect};
use serde::Deserialize;
use sqlparser::ast::AlterTableOperation;

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Payload {
    #[serde(alias = "columnList")]
    list: Vec<String>,
}

impl Default for Payload {
    fn default() -> Self {
        Self {
            list: ["id", "created_ts", "updated_ts", "creator_id", "updater_id"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

struct Scope {
    table: String,
    columns: Vec<String>,
}

pub struct ColumnRequired {
    base: RuleBase,
    dialect: Dialect,
    /// Required names folded the way the dialect stores unquoted identifiers.
    required: Vec<(String, String)>,
    scopes: Vec<Scope>,
}

impl ColumnRequired {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        let payload: Payload = ctx.payload()?;
        let required = payload
            .list
            .into_iter()
            .map(|name| (ctx.dialect.fold_unquoted(&name), name))
            .collect();
        Ok(Box::new(Self {
            base: ctx.rule_base(),
            dialect: ctx.dialect,
            required,
            scopes: Vec::new(),
        }))
    }

    fn is_required(&self, column: &str) -> Option<&str> {
        self.required
            .iter()
            .find(|(folded, _)| self.dialect.names_match(folded, column))
            .map(|(_, original)| original.as_str())
    }
}

impl Rule for ColumnRequired {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        matches!(
            kind,
            NodeKind::CreateTable | NodeKind::ColumnDef | NodeKind::AlterTableOperation
        )
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        match node {
            Node::CreateTable(create) => {
                // CREATE TABLE ... AS SELECT has no column list to check.
                if create.query.is_none() {
                    self.scopes.push(Scope {
                        table: create.name.to_string(),
                        columns: Vec::new(),
                    });
                }
            }
            Node::ColumnDef(column) => {
                let name = self.dialect.normalize_identifier(&column.name);
                if let Some(scope) = self.scopes.last_mut() {
                    scope.columns.push(name);
                }
            }
            Node::AlterTableOperation(AlterTableOperation::DropColumn { column_names, .. }) => {
                let dropped: Vec<&str> = column_names
                    .iter()
                    .map(|ident| self.dialect.normalize_identifier(ident))
                    .filter_map(|name| self.is_required(&name))
                    .collect();
                if !dropped.is_empty() {
                    let content = format!("Column(s) {} are required", dropped.join(", "));
                    self.base
                        .report(advice_codes::NO_REQUIRED_COLUMN, content, node.position());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn on_exit(&mut self, node: Node<'_>, kind: NodeKind) -> Result<(), RuleError> {
        let Node::CreateTable(create) = node else {
            return Ok(());
        };
        if create.query.is_some() {
            return Ok(());
        }
        let scope = self.scopes.pop().ok_or(RuleError::ScopeUnderflow {
            kind: kind.as_str(),
        })?;
        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|(folded, _)| {
                !scope
                    .columns
                    .iter()
                    .any(|column| self.dialect.names_match(folded, column))
            })
            .map(|(_, original)| original.as_str())
            .collect();
        if !missing.is_empty() {
            let content = format!(
                "Table `{}` requires columns: {}",
                scope.table,
                missing.join(", ")
            );
            self.base
                .report(advice_codes::NO_REQUIRED_COLUMN, content, node.position());
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.scopes.clear();
    }
}
