//! Review orchestration: parse a batch, replay it against the schema
//! snapshot, then drive every configured rule over it in one pass per
//! statement.
//!
//! # Example
//!
//! ```
//! use sqlreview_core::advisor::{check, RuleDescriptor, RuleKind, RuleLevel, ReviewContext};
//! use sqlreview_core::types::{AdviceStatus, Dialect};
//!
//! let rules = vec![RuleDescriptor::new(RuleKind::TableRequirePk, RuleLevel::Error)];
//! let advice = check(
//!     "CREATE TABLE t (id int)",
//!     Dialect::Postgres,
//!     &rules,
//!     &ReviewContext::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(advice[0].status, AdviceStatus::Error);
//! assert_eq!(advice[0].content, "Table `t` requires PRIMARY KEY");
//! ```

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod helpers;
pub mod node;
pub mod registry;
pub mod rule;
pub mod rules;

pub use config::{
    merge, parse_overrides, RuleDescriptor, RuleOverride, RuleTemplate, DEFAULT_TEMPLATE,
};
pub use dispatch::Dispatcher;
pub use node::{Node, NodeKind};
pub use registry::{global_registry, RegistryBuilder, RuleRegistry};
pub use rule::{CheckContext, Rule, RuleBase, RuleFactory, RuleKind, RuleLevel, StatementOrigin};

use crate::error::{ParseError, ReviewError};
use crate::parser::parse_statements;
use crate::types::{advice_codes, Advice, AdviceStatus, ChangeType, DatabaseSchema, Dialect};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
#[cfg(feature = "tracing")]
use tracing::{debug, info_span};

/// Default cap for each severity bucket.
pub const DEFAULT_MAX_ADVICE: usize = 100;

/// Title of advice produced by the schema walk-through.
pub const WALK_THROUGH_TITLE: &str = "walk-through";

/// Title of the advice produced for unparsable input.
pub const SYNTAX_ERROR_TITLE: &str = "Syntax error";

/// Cooperative cancellation flag, checked between statements.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-run environment shared by all rules.
#[derive(Debug, Clone, Default)]
pub struct ReviewContext {
    pub current_database: Option<String>,
    pub current_schema: Option<String>,
    /// Schema snapshot before the change; enables the walk-through and
    /// schema-aware rules.
    pub schema: Option<DatabaseSchema>,
    pub change_type: ChangeType,
    /// Skips the built-in rules merged into every run.
    pub suppress_builtin: bool,
    pub cancellation: Option<CancellationToken>,
}

impl ReviewContext {
    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Rules merged into every run unless suppressed.
const BUILTIN_RULES: [RuleKind; 1] = [RuleKind::StatementPriorBackupCheck];

/// Runs rule lists against SQL batches.
#[derive(Clone, Copy)]
pub struct SqlReviewer<'r> {
    registry: &'r RuleRegistry,
    max_errors: usize,
    max_warnings: usize,
}

impl Default for SqlReviewer<'static> {
    fn default() -> Self {
        Self::new(global_registry())
    }
}

impl<'r> SqlReviewer<'r> {
    pub fn new(registry: &'r RuleRegistry) -> Self {
        Self {
            registry,
            max_errors: DEFAULT_MAX_ADVICE,
            max_warnings: DEFAULT_MAX_ADVICE,
        }
    }

    /// Overrides the per-severity caps.
    pub fn with_limits(mut self, max_errors: usize, max_warnings: usize) -> Self {
        self.max_errors = max_errors;
        self.max_warnings = max_warnings;
        self
    }

    /// Reviews `sql` with `rules`, returning errors first, then warnings.
    ///
    /// A batch without findings yields a single [`Advice::ok`]. Only
    /// configuration problems and cancellation are returned as errors; parse
    /// failures, schema inconsistencies and rule faults are advice.
    pub fn check(
        &self,
        sql: &str,
        dialect: Dialect,
        rules: &[RuleDescriptor],
        context: &ReviewContext,
    ) -> Result<Vec<Advice>, ReviewError> {
        #[cfg(feature = "tracing")]
        let _span = info_span!("check", %dialect, rules = rules.len()).entered();

        let statements = match parse_statements(sql, dialect) {
            Ok(statements) => statements,
            Err(err) => return Ok(vec![syntax_error(err)]),
        };
        if statements.is_empty() {
            return Ok(vec![Advice::ok()]);
        }

        let descriptors = self.with_builtin(rules, context);

        let mut final_schema = None;
        if let Some(schema) = context.schema.as_ref().filter(|_| catalog::supports(dialect)) {
            match catalog::walk_through(schema, dialect, context.current_schema.as_deref(), &statements)
            {
                Ok(walked) => final_schema = Some(walked),
                Err(err) => {
                    return Ok(vec![Advice::error(err.code, WALK_THROUGH_TITLE, err.message)
                        .with_line(err.line)]);
                }
            }
        }

        let mut faults = Vec::new();

        let mut active = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            if descriptor.level == RuleLevel::Disabled || !descriptor.applies_to(dialect) {
                continue;
            }
            let Some(factory) = self.registry.lookup(dialect, descriptor.kind) else {
                #[cfg(feature = "tracing")]
                debug!(rule = %descriptor.kind, %dialect, "rule not available for dialect");
                continue;
            };
            let ctx = CheckContext {
                dialect,
                descriptor,
                statements: &statements,
                current_database: context.current_database.as_deref(),
                current_schema: context.current_schema.as_deref(),
                schema: context.schema.as_ref(),
                final_schema: final_schema.as_ref(),
                change_type: context.change_type,
            };
            match panic::catch_unwind(AssertUnwindSafe(|| factory(&ctx))) {
                Ok(rule) => active.push(rule?),
                Err(payload) => faults.push(dispatch::factory_fault(
                    descriptor.kind,
                    payload,
                    statements[0].start_position(),
                )),
            }
        }
        if active.is_empty() && faults.is_empty() {
            return Ok(vec![Advice::ok()]);
        }

        let mut dispatcher = Dispatcher::new(active);
        let mut buckets = Buckets::new(self.max_errors, self.max_warnings);
        buckets.extend(faults);
        for statement in &statements {
            if context.is_cancelled() {
                #[cfg(feature = "tracing")]
                debug!(statement = statement.index, "review cancelled");
                return Err(ReviewError::Cancelled);
            }
            dispatcher.walk(statement);
            buckets.extend(dispatcher.drain());
            if buckets.is_full() {
                break;
            }
        }
        if !buckets.is_full() {
            dispatcher.finish();
            buckets.extend(dispatcher.drain());
        }

        Ok(buckets.into_advice())
    }

    fn with_builtin(&self, rules: &[RuleDescriptor], context: &ReviewContext) -> Vec<RuleDescriptor> {
        let mut descriptors = rules.to_vec();
        if !context.suppress_builtin {
            for kind in BUILTIN_RULES {
                if !descriptors.iter().any(|descriptor| descriptor.kind == kind) {
                    descriptors.push(RuleDescriptor::new(kind, RuleLevel::Warning));
                }
            }
        }
        descriptors
    }
}

/// Reviews `sql` with the shipped rule registry and default caps.
pub fn check(
    sql: &str,
    dialect: Dialect,
    rules: &[RuleDescriptor],
    context: &ReviewContext,
) -> Result<Vec<Advice>, ReviewError> {
    SqlReviewer::default().check(sql, dialect, rules, context)
}

fn syntax_error(err: ParseError) -> Advice {
    let advice = Advice::error(
        advice_codes::STATEMENT_SYNTAX_ERROR,
        SYNTAX_ERROR_TITLE,
        err.message,
    );
    match err.position {
        Some(position) => advice.with_position(position),
        None => advice,
    }
}

/// Severity buckets filled in evaluation order up to their caps.
struct Buckets {
    errors: Vec<Advice>,
    warnings: Vec<Advice>,
    max_errors: usize,
    max_warnings: usize,
}

impl Buckets {
    fn new(max_errors: usize, max_warnings: usize) -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            max_errors,
            max_warnings,
        }
    }

    fn extend(&mut self, advice: Vec<Advice>) {
        for item in advice {
            match item.status {
                AdviceStatus::Error if self.errors.len() < self.max_errors => {
                    self.errors.push(item)
                }
                AdviceStatus::Warning if self.warnings.len() < self.max_warnings => {
                    self.warnings.push(item)
                }
                _ => {}
            }
        }
    }

    fn is_full(&self) -> bool {
        self.errors.len() >= self.max_errors && self.warnings.len() >= self.max_warnings
    }

    fn into_advice(mut self) -> Vec<Advice> {
        self.errors.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        self.warnings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let mut advice = self.errors;
        advice.append(&mut self.warnings);
        if advice.is_empty() {
            advice.push(Advice::ok());
        }
        advice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SchemaMetadata, TableMetadata};

    fn rules(kinds: &[(RuleKind, RuleLevel)]) -> Vec<RuleDescriptor> {
        kinds
            .iter()
            .map(|(kind, level)| RuleDescriptor::new(*kind, *level))
            .collect()
    }

    #[test]
    fn clean_batch_returns_single_ok() {
        let advice = check(
            "SELECT id FROM t WHERE id = 1",
            Dialect::Postgres,
            &rules(&[(RuleKind::StatementNoSelectAll, RuleLevel::Error)]),
            &ReviewContext::default(),
        )
        .unwrap();
        assert_eq!(advice, vec![Advice::ok()]);
    }

    #[test]
    fn syntax_error_is_single_advice_with_absolute_line() {
        let advice = check(
            "SELECT 1;\nSELEC oops",
            Dialect::Postgres,
            &rules(&[(RuleKind::StatementNoSelectAll, RuleLevel::Error)]),
            &ReviewContext::default(),
        )
        .unwrap();
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::STATEMENT_SYNTAX_ERROR);
        assert_eq!(advice[0].line, Some(2));
    }

    #[test]
    fn errors_come_before_warnings() {
        let advice = check(
            "SELECT * FROM t;\nDELETE FROM t;",
            Dialect::Postgres,
            &rules(&[
                (RuleKind::StatementNoSelectAll, RuleLevel::Warning),
                (RuleKind::StatementRequireWhere, RuleLevel::Error),
            ]),
            &ReviewContext::default(),
        )
        .unwrap();
        let statuses: Vec<_> = advice.iter().map(|a| a.status).collect();
        assert_eq!(statuses, vec![AdviceStatus::Error, AdviceStatus::Warning]);
        assert_eq!(advice[0].line, Some(2));
    }

    #[test]
    fn disabled_and_foreign_dialect_rules_are_skipped() {
        let mut list = rules(&[(RuleKind::StatementNoSelectAll, RuleLevel::Disabled)]);
        list.push(
            RuleDescriptor::new(RuleKind::StatementRequireWhere, RuleLevel::Error)
                .for_dialect(Dialect::Mysql),
        );
        let advice = check(
            "SELECT * FROM t; DELETE FROM t",
            Dialect::Postgres,
            &list,
            &ReviewContext::default(),
        )
        .unwrap();
        assert_eq!(advice, vec![Advice::ok()]);
    }

    #[test]
    fn walk_through_failure_short_circuits() {
        let schema = DatabaseSchema {
            name: "shop".to_string(),
            schemas: vec![SchemaMetadata {
                name: "public".to_string(),
                tables: vec![TableMetadata {
                    name: "orders".to_string(),
                    columns: Vec::new(),
                    indexes: Vec::new(),
                }],
            }],
        };
        let context = ReviewContext {
            schema: Some(schema),
            ..ReviewContext::default()
        };
        let advice = check(
            "SELECT * FROM orders;\n\nCREATE TABLE orders (id int)",
            Dialect::Postgres,
            &rules(&[(RuleKind::StatementNoSelectAll, RuleLevel::Error)]),
            &context,
        )
        .unwrap();
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::TABLE_EXISTS);
        assert_eq!(advice[0].title, WALK_THROUGH_TITLE);
        assert_eq!(advice[0].line, Some(3));
    }

    #[test]
    fn bad_payload_is_a_config_error() {
        let list = vec![RuleDescriptor::new(RuleKind::NamingTable, RuleLevel::Warning)
            .with_payload(serde_json::json!({ "format": "(" }))];
        let result = check(
            "CREATE TABLE t (id int)",
            Dialect::Postgres,
            &list,
            &ReviewContext::default(),
        );
        assert!(matches!(result, Err(ReviewError::Config(_))));
    }

    fn exploding_factory(_ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, crate::error::ConfigError> {
        panic!("factory blew up");
    }

    #[test]
    fn panicking_factory_becomes_internal_advice() {
        let mut builder = RegistryBuilder::new();
        builder
            .register(Dialect::Postgres, RuleKind::StatementNoSelectAll, exploding_factory)
            .register(
                Dialect::Postgres,
                RuleKind::StatementRequireWhere,
                rules::require_where::RequireWhere::create,
            );
        let registry = builder.build();

        let advice = SqlReviewer::new(&registry)
            .check(
                "\nDELETE FROM t",
                Dialect::Postgres,
                &rules(&[
                    (RuleKind::StatementNoSelectAll, RuleLevel::Warning),
                    (RuleKind::StatementRequireWhere, RuleLevel::Error),
                ]),
                &ReviewContext::default(),
            )
            .unwrap();

        let found: Vec<_> = advice
            .iter()
            .map(|advice| (advice.code, advice.title.as_str(), advice.line))
            .collect();
        assert_eq!(
            found,
            vec![
                (advice_codes::STATEMENT_NO_WHERE, "statement.where.require", Some(2)),
                (advice_codes::INTERNAL, "statement.select.no-select-all", Some(2)),
            ]
        );
        assert!(advice[1].content.contains("factory blew up"));
    }

    #[test]
    fn cancelled_token_stops_the_run() {
        let token = CancellationToken::new();
        token.cancel();
        let context = ReviewContext {
            cancellation: Some(token),
            ..ReviewContext::default()
        };
        let result = check(
            "SELECT * FROM t",
            Dialect::Postgres,
            &rules(&[(RuleKind::StatementNoSelectAll, RuleLevel::Error)]),
            &context,
        );
        assert!(matches!(result, Err(ReviewError::Cancelled)));
    }

    #[test]
    fn builtin_prior_backup_runs_unless_suppressed() {
        let sql = "UPDATE t SET a = 1 WHERE a > 1;\nDELETE FROM t WHERE a < 0;";
        let mut context = ReviewContext {
            change_type: ChangeType::Dml,
            ..ReviewContext::default()
        };
        let advice = check(sql, Dialect::Mysql, &[], &context).unwrap();
        assert_eq!(advice[0].code, advice_codes::BUILTIN_PRIOR_BACKUP_CHECK);

        context.suppress_builtin = true;
        assert_eq!(
            check(sql, Dialect::Mysql, &[], &context).unwrap(),
            vec![Advice::ok()]
        );
    }
}
