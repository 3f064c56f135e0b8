//! statement.prior-backup-check: DML batches must stay compatible with the
//! backup taken before they run.
//!
//! The decision needs the whole batch, so the statements are scanned once
//! when the rule is built and the findings are emitted from `finish`.

use crate::advisor::helpers::{expr_column_name, unquote, TableKey};
use crate::advisor::node::NodeKind;
use crate::advisor::rule::{CheckContext, Rule, RuleBase, StatementOrigin};
use crate::error::{ConfigError, RuleError};
use crate::parser::ParsedStatement;
use crate::types::{advice_codes, ChangeType, DatabaseSchema, Dialect};
use sqlparser::ast::{BinaryOperator, Expr, FromTable, ObjectName, Statement, TableFactor};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Update,
    Delete,
}

impl Operation {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

struct Modification<'a> {
    operation: Operation,
    selection: Option<&'a Expr>,
    origin: StatementOrigin,
}

struct Finding {
    origin: StatementOrigin,
    content: String,
}

pub struct PriorBackupCheck {
    base: RuleBase,
    pending: Vec<Finding>,
}

impl PriorBackupCheck {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        let pending = if ctx.change_type == ChangeType::Dml {
            scan(ctx)
        } else {
            Vec::new()
        };
        Ok(Box::new(Self {
            base: ctx.rule_base(),
            pending,
        }))
    }
}

impl Rule for PriorBackupCheck {
    rule_base!();

    fn interested_in(&self, _kind: NodeKind) -> bool {
        false
    }

    fn finish(&mut self) -> Result<(), RuleError> {
        for finding in std::mem::take(&mut self.pending) {
            self.base.report_at(
                finding.origin,
                advice_codes::BUILTIN_PRIOR_BACKUP_CHECK,
                finding.content,
                None,
            );
        }
        Ok(())
    }
}

fn is_ddl(statement: &Statement) -> bool {
    matches!(
        statement,
        Statement::CreateTable(_)
            | Statement::CreateView { .. }
            | Statement::CreateIndex(_)
            | Statement::CreateSchema { .. }
            | Statement::AlterTable { .. }
            | Statement::AlterIndex { .. }
            | Statement::AlterView { .. }
            | Statement::Drop { .. }
            | Statement::Truncate { .. }
    )
}

fn is_dml(statement: &Statement) -> bool {
    matches!(
        statement,
        Statement::Insert(_) | Statement::Update { .. } | Statement::Delete(_) | Statement::Merge { .. }
    )
}

fn scan(ctx: &CheckContext<'_>) -> Vec<Finding> {
    let mut findings = Vec::new();

    let first_ddl = ctx
        .statements
        .iter()
        .find(|statement| is_ddl(&statement.statement));
    let has_dml = ctx
        .statements
        .iter()
        .any(|statement| is_dml(&statement.statement));
    if let (Some(ddl), true) = (first_ddl, has_dml) {
        findings.push(Finding {
            origin: StatementOrigin::of(ddl),
            content: "Prior backup cannot deal with mixed DDL and DML statements".to_string(),
        });
    }

    let mut groups: BTreeMap<TableKey, Vec<Modification<'_>>> = BTreeMap::new();
    for statement in ctx.statements {
        if let Some((name, modification)) = modification(statement) {
            let Some(key) =
                TableKey::resolve(name, ctx.dialect, ctx.current_database, ctx.current_schema)
            else {
                continue;
            };
            groups.entry(key).or_default().push(modification);
        }
    }

    for (key, group) in &groups {
        let Some(first) = group.first() else {
            continue;
        };
        if group.iter().all(|m| m.operation == first.operation) {
            continue;
        }
        let keys = unique_keys(ctx.schema, ctx.dialect, key);
        let all_keyed = group
            .iter()
            .all(|m| filters_on_unique_key(m.selection, &keys, ctx.dialect));
        if all_keyed {
            continue;
        }
        let operations: Vec<&str> = [Operation::Update, Operation::Delete]
            .iter()
            .filter(|op| group.iter().any(|m| m.operation == **op))
            .map(Operation::as_str)
            .collect();
        findings.push(Finding {
            origin: first.origin,
            content: format!(
                "Prior backup cannot handle mixed {} statements on the same table `{}`",
                operations.join(" and "),
                key.table
            ),
        });
    }

    findings
}

fn modification(statement: &ParsedStatement) -> Option<(&ObjectName, Modification<'_>)> {
    let origin = StatementOrigin::of(statement);
    match &statement.statement {
        Statement::Update {
            table, selection, ..
        } => {
            let TableFactor::Table { name, .. } = &table.relation else {
                return None;
            };
            Some((
                name,
                Modification {
                    operation: Operation::Update,
                    selection: selection.as_ref(),
                    origin,
                },
            ))
        }
        Statement::Delete(delete) => {
            let (FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables)) =
                &delete.from;
            let TableFactor::Table { name, .. } = &tables.first()?.relation else {
                return None;
            };
            Some((
                name,
                Modification {
                    operation: Operation::Delete,
                    selection: delete.selection.as_ref(),
                    origin,
                },
            ))
        }
        _ => None,
    }
}

/// Column sets of the table's primary and unique keys, folded for comparison.
fn unique_keys(schema: Option<&DatabaseSchema>, dialect: Dialect, key: &TableKey) -> Vec<Vec<String>> {
    let Some(table) = schema.and_then(|db| db.table(dialect, key.schema.as_deref(), &key.table))
    else {
        return Vec::new();
    };
    table
        .indexes
        .iter()
        .filter(|index| index.primary || index.unique)
        .filter(|index| !index.expressions.is_empty())
        .map(|index| {
            index
                .expressions
                .iter()
                .map(|column| dialect.fold_unquoted(unquote(column)))
                .collect()
        })
        .collect()
}

fn filters_on_unique_key(selection: Option<&Expr>, keys: &[Vec<String>], dialect: Dialect) -> bool {
    let Some(selection) = selection else {
        return false;
    };
    let mut columns = Vec::new();
    if !equality_columns(selection, dialect, &mut columns) {
        return false;
    }
    keys.iter().any(|key| {
        key.iter()
            .all(|part| columns.iter().any(|column| dialect.names_match(part, column)))
    })
}

/// Collects `column = literal` terms of a pure AND conjunction.
///
/// Returns false when the predicate contains anything else, since an OR or a
/// range can match more than one row.
fn equality_columns(expr: &Expr, dialect: Dialect, columns: &mut Vec<String>) -> bool {
    match expr {
        Expr::Nested(inner) => equality_columns(inner, dialect, columns),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => equality_columns(left, dialect, columns) && equality_columns(right, dialect, columns),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (column @ (Expr::Identifier(_) | Expr::CompoundIdentifier(_)), Expr::Value(_))
            | (Expr::Value(_), column @ (Expr::Identifier(_) | Expr::CompoundIdentifier(_))) => {
                columns.push(expr_column_name(column, dialect));
                true
            }
            _ => false,
        },
        _ => false,
    }
}
