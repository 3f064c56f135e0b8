//! Rule contract shared by every review rule.

use super::config::RuleDescriptor;
use super::node::{Node, NodeKind};
use crate::error::{ConfigError, Position, RuleError};
use crate::parser::ParsedStatement;
use crate::types::{Advice, AdviceStatus, ChangeType, DatabaseSchema, Dialect};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Stable identifier of a rule, as written in rule templates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum RuleKind {
    #[serde(rename = "statement.select.no-select-all")]
    StatementNoSelectAll,
    #[serde(rename = "statement.where.require")]
    StatementRequireWhere,
    #[serde(rename = "statement.where.no-leading-wildcard-like")]
    StatementNoLeadingWildcardLike,
    #[serde(rename = "statement.disallow-commit")]
    StatementDisallowCommit,
    #[serde(rename = "statement.disallow-limit")]
    StatementDisallowLimit,
    #[serde(rename = "statement.disallow-order-by")]
    StatementDisallowOrderBy,
    #[serde(rename = "statement.merge-alter-table")]
    StatementMergeAlterTable,
    #[serde(rename = "statement.insert.row-limit")]
    StatementInsertRowLimit,
    #[serde(rename = "statement.insert.must-specify-column")]
    StatementInsertMustSpecifyColumn,
    #[serde(rename = "statement.prior-backup-check")]
    StatementPriorBackupCheck,
    #[serde(rename = "naming.table")]
    NamingTable,
    #[serde(rename = "table.require-pk")]
    TableRequirePk,
    #[serde(rename = "table.no-foreign-key")]
    TableNoForeignKey,
    #[serde(rename = "column.required")]
    ColumnRequired,
    #[serde(rename = "column.no-null")]
    ColumnNoNull,
    #[serde(rename = "index.key-number-limit")]
    IndexKeyNumberLimit,
    #[serde(rename = "index.no-duplicate-column")]
    IndexNoDuplicateColumn,
    #[serde(rename = "index.not-redundant")]
    IndexNotRedundant,
}

impl RuleKind {
    pub const ALL: [RuleKind; 18] = [
        Self::StatementNoSelectAll,
        Self::StatementRequireWhere,
        Self::StatementNoLeadingWildcardLike,
        Self::StatementDisallowCommit,
        Self::StatementDisallowLimit,
        Self::StatementDisallowOrderBy,
        Self::StatementMergeAlterTable,
        Self::StatementInsertRowLimit,
        Self::StatementInsertMustSpecifyColumn,
        Self::StatementPriorBackupCheck,
        Self::NamingTable,
        Self::TableRequirePk,
        Self::TableNoForeignKey,
        Self::ColumnRequired,
        Self::ColumnNoNull,
        Self::IndexKeyNumberLimit,
        Self::IndexNoDuplicateColumn,
        Self::IndexNotRedundant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatementNoSelectAll => "statement.select.no-select-all",
            Self::StatementRequireWhere => "statement.where.require",
            Self::StatementNoLeadingWildcardLike => "statement.where.no-leading-wildcard-like",
            Self::StatementDisallowCommit => "statement.disallow-commit",
            Self::StatementDisallowLimit => "statement.disallow-limit",
            Self::StatementDisallowOrderBy => "statement.disallow-order-by",
            Self::StatementMergeAlterTable => "statement.merge-alter-table",
            Self::StatementInsertRowLimit => "statement.insert.row-limit",
            Self::StatementInsertMustSpecifyColumn => "statement.insert.must-specify-column",
            Self::StatementPriorBackupCheck => "statement.prior-backup-check",
            Self::NamingTable => "naming.table",
            Self::TableRequirePk => "table.require-pk",
            Self::TableNoForeignKey => "table.no-foreign-key",
            Self::ColumnRequired => "column.required",
            Self::ColumnNoNull => "column.no-null",
            Self::IndexKeyNumberLimit => "index.key-number-limit",
            Self::IndexNoDuplicateColumn => "index.no-duplicate-column",
            Self::IndexNotRedundant => "index.not-redundant",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == trimmed)
            .ok_or_else(|| ConfigError::UnknownRuleKind(trimmed.to_string()))
    }
}

/// Severity a rule reports with, or `Disabled` to skip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleLevel {
    Error,
    Warning,
    Disabled,
}

impl RuleLevel {
    /// Advice status for an enabled level.
    pub fn status(&self) -> Option<AdviceStatus> {
        match self {
            Self::Error => Some(AdviceStatus::Error),
            Self::Warning => Some(AdviceStatus::Warning),
            Self::Disabled => None,
        }
    }

    /// Parses a level without a rule name for error context.
    pub fn parse_for(rule: &str, level: &str) -> Result<Self, ConfigError> {
        match level.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(Self::Error),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "DISABLED" | "OFF" => Ok(Self::Disabled),
            _ => Err(ConfigError::UnknownLevel {
                rule: rule.to_string(),
                level: level.to_string(),
            }),
        }
    }
}

/// Where the statement being walked sits inside the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementOrigin {
    pub index: usize,
    pub base_line: usize,
    pub base_column: usize,
}

impl StatementOrigin {
    pub fn of(statement: &ParsedStatement) -> Self {
        Self {
            index: statement.index,
            base_line: statement.base_line,
            base_column: statement.base_column,
        }
    }

    /// Converts a statement-relative position into batch coordinates.
    pub fn absolute(&self, position: Position) -> Position {
        let column = if position.line == 1 {
            position.column + self.base_column
        } else {
            position.column
        };
        Position::new(position.line + self.base_line, column)
    }
}

/// Advice accumulator and line correction shared by all rules.
///
/// Rules append advice only through [`RuleBase::report`] (or
/// [`RuleBase::report_at`] for deferred findings) so the statement's base
/// line is added exactly once.
#[derive(Debug, Clone)]
pub struct RuleBase {
    status: AdviceStatus,
    title: &'static str,
    advice: Vec<Advice>,
    origin: StatementOrigin,
    statement_text: Arc<str>,
}

impl RuleBase {
    pub fn new(status: AdviceStatus, title: &'static str) -> Self {
        Self {
            status,
            title,
            advice: Vec::new(),
            origin: StatementOrigin::default(),
            statement_text: Arc::from(""),
        }
    }

    pub fn title(&self) -> &'static str {
        self.title
    }

    pub fn status(&self) -> AdviceStatus {
        self.status
    }

    /// Called by the dispatcher before a statement is walked.
    pub fn begin_statement(&mut self, origin: StatementOrigin, text: Arc<str>) {
        self.origin = origin;
        self.statement_text = text;
    }

    pub fn origin(&self) -> StatementOrigin {
        self.origin
    }

    /// Text of the statement being walked.
    pub fn statement_text(&self) -> &str {
        &self.statement_text
    }

    /// Records a finding for the current statement.
    ///
    /// `position` is relative to the statement; `None` falls back to the
    /// statement start.
    pub fn report(&mut self, code: i32, content: impl Into<String>, position: Option<Position>) {
        self.report_at(self.origin, code, content, position);
    }

    /// Records a finding for a statement walked earlier in the batch.
    pub fn report_at(
        &mut self,
        origin: StatementOrigin,
        code: i32,
        content: impl Into<String>,
        position: Option<Position>,
    ) {
        let relative = position.unwrap_or(Position::new(1, 1));
        let advice = Advice::new(self.status, code, self.title, content)
            .with_position(origin.absolute(relative));
        self.advice.push(advice);
    }

    pub fn take_advice(&mut self) -> Vec<Advice> {
        std::mem::take(&mut self.advice)
    }
}

/// A single review rule driven by the dispatcher.
///
/// Callbacks receive every node the rule is interested in, in pre-order for
/// `on_enter` and post-order for `on_exit`. Per-statement state must be
/// cleared in [`Rule::reset`]; batch-wide findings are flushed in
/// [`Rule::finish`].
pub trait Rule: Send {
    /// Stable identifier used in diagnostics.
    fn name(&self) -> &'static str {
        self.base().title()
    }

    fn base(&self) -> &RuleBase;

    fn base_mut(&mut self) -> &mut RuleBase;

    /// Node kinds this rule wants to see. Defaults to all of them.
    fn interested_in(&self, _kind: NodeKind) -> bool {
        true
    }

    fn on_enter(&mut self, _node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        Ok(())
    }

    fn on_exit(&mut self, _node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        Ok(())
    }

    /// Drops per-statement state after a statement walk.
    fn reset(&mut self) {}

    /// Runs once after the whole batch was walked.
    fn finish(&mut self) -> Result<(), RuleError> {
        Ok(())
    }

    /// Drains the advice accumulated so far.
    fn collected_advice(&mut self) -> Vec<Advice> {
        self.base_mut().take_advice()
    }
}

/// Read-only environment handed to a rule factory.
#[derive(Clone, Copy)]
pub struct CheckContext<'a> {
    pub dialect: Dialect,
    pub descriptor: &'a RuleDescriptor,
    pub statements: &'a [ParsedStatement],
    pub current_database: Option<&'a str>,
    pub current_schema: Option<&'a str>,
    /// Snapshot before the change.
    pub schema: Option<&'a DatabaseSchema>,
    /// `schema` with the batch's DDL replayed. `None` when no walk-through ran.
    pub final_schema: Option<&'a DatabaseSchema>,
    pub change_type: ChangeType,
}

impl<'a> CheckContext<'a> {
    /// Base for a rule built from this context.
    pub fn rule_base(&self) -> RuleBase {
        let status = self
            .descriptor
            .level
            .status()
            .unwrap_or(AdviceStatus::Warning);
        RuleBase::new(status, self.descriptor.kind.as_str())
    }

    /// Typed view of the descriptor payload.
    pub fn payload<T: DeserializeOwned + Default>(&self) -> Result<T, ConfigError> {
        self.descriptor.payload_as()
    }
}

/// Builds a fresh rule instance for one check run.
pub type RuleFactory = fn(&CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError>;
