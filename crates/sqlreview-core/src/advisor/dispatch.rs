//! Single-pass node dispatch.
//!
//! One walk over each statement drives every active rule. For each node the
//! dispatcher calls `on_enter` on all interested rules in registration order,
//! walks the children left to right, then calls `on_exit` in the same order.
//! A rule that returns an error or panics is reported once as an internal
//! error and skipped for the rest of the batch.

use super::node::{Node, UpdateNode};
use super::rule::{Rule, RuleKind, StatementOrigin};
use crate::error::{Position, RuleError};
use crate::parser::ParsedStatement;
use crate::types::{advice_codes, Advice};
use sqlparser::ast::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
#[cfg(feature = "tracing")]
use tracing::warn;

struct RuleSlot {
    rule: Box<dyn Rule>,
    faulted: bool,
}

#[derive(Clone, Copy)]
enum Phase {
    Enter,
    Exit,
}

/// Drives a fixed set of rules over statements.
pub struct Dispatcher {
    slots: Vec<RuleSlot>,
    faults: Vec<Advice>,
    origin: StatementOrigin,
}

impl Dispatcher {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self {
            slots: rules
                .into_iter()
                .map(|rule| RuleSlot {
                    rule,
                    faulted: false,
                })
                .collect(),
            faults: Vec::new(),
            origin: StatementOrigin::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Walks one statement, then resets per-statement rule state.
    pub fn walk(&mut self, statement: &ParsedStatement) {
        self.origin = StatementOrigin::of(statement);
        let text: Arc<str> = Arc::from(statement.text.as_str());
        for slot in &mut self.slots {
            slot.rule
                .base_mut()
                .begin_statement(self.origin, Arc::clone(&text));
        }

        self.statement(&statement.statement);

        for slot in &mut self.slots {
            if slot.faulted {
                continue;
            }
            let result = panic::catch_unwind(AssertUnwindSafe(|| slot.rule.reset()));
            if let Err(payload) = result {
                fault(slot, &mut self.faults, self.origin, panic_message(payload));
            }
        }
    }

    /// Lets deferred rules flush findings gathered over the whole batch.
    pub fn finish(&mut self) {
        for slot in &mut self.slots {
            if slot.faulted {
                continue;
            }
            let result = panic::catch_unwind(AssertUnwindSafe(|| slot.rule.finish()));
            if let Some(message) = failure(result) {
                fault(slot, &mut self.faults, self.origin, message);
            }
        }
    }

    /// Takes all advice produced since the last drain, in rule order.
    pub fn drain(&mut self) -> Vec<Advice> {
        let mut advice: Vec<Advice> = self
            .slots
            .iter_mut()
            .flat_map(|slot| slot.rule.collected_advice())
            .collect();
        advice.append(&mut self.faults);
        advice
    }

    fn emit(&mut self, node: Node<'_>, phase: Phase) {
        let kind = node.kind();
        for slot in &mut self.slots {
            if slot.faulted {
                continue;
            }
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                if !slot.rule.interested_in(kind) {
                    return Ok(());
                }
                match phase {
                    Phase::Enter => slot.rule.on_enter(node, kind),
                    Phase::Exit => slot.rule.on_exit(node, kind),
                }
            }));
            if let Some(message) = failure(result) {
                fault(slot, &mut self.faults, self.origin, message);
            }
        }
    }

    /// Emits `enter`, walks children, emits `exit`.
    fn scoped(&mut self, node: Node<'_>, children: impl FnOnce(&mut Self)) {
        self.emit(node, Phase::Enter);
        children(self);
        self.emit(node, Phase::Exit);
    }

    fn statement(&mut self, statement: &Statement) {
        self.scoped(Node::Statement(statement), |d| match statement {
            Statement::Query(query) => d.query(query),
            Statement::Insert(insert) => d.scoped(Node::Insert(insert), |d| {
                if let Some(source) = &insert.source {
                    d.query(source);
                }
            }),
            Statement::Update {
                table,
                assignments,
                from,
                selection,
                returning,
                limit,
                ..
            } => {
                let update = UpdateNode {
                    table,
                    from: from.as_ref(),
                    selection: selection.as_ref(),
                    limit: limit.as_ref(),
                };
                d.scoped(Node::Update(update), |d| {
                    d.table_with_joins(table);
                    if let Some(UpdateTableFromKind::BeforeSet(tables)) = from {
                        for table in tables {
                            d.table_with_joins(table);
                        }
                    }
                    for assignment in assignments {
                        d.expr(&assignment.value);
                    }
                    if let Some(UpdateTableFromKind::AfterSet(tables)) = from {
                        for table in tables {
                            d.table_with_joins(table);
                        }
                    }
                    d.exprs(selection);
                    d.exprs(limit);
                    for item in returning.iter().flatten() {
                        d.select_item(item);
                    }
                });
            }
            Statement::Delete(delete) => d.scoped(Node::Delete(delete), |d| {
                match &delete.from {
                    FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => {
                        for table in tables {
                            d.table_with_joins(table);
                        }
                    }
                }
                if let Some(using) = &delete.using {
                    for table in using {
                        d.table_with_joins(table);
                    }
                }
                if let Some(selection) = &delete.selection {
                    d.expr(selection);
                }
                for order_by in &delete.order_by {
                    d.order_by_expr(order_by);
                }
            }),
            Statement::CreateTable(create) => d.scoped(Node::CreateTable(create), |d| {
                for column in &create.columns {
                    d.column_def(column);
                }
                for constraint in &create.constraints {
                    d.scoped(Node::TableConstraint(constraint), |_| {});
                }
                if let Some(query) = &create.query {
                    d.query(query);
                }
            }),
            Statement::CreateView { query, .. } => d.query(query),
            Statement::AlterTable {
                name, operations, ..
            } => d.scoped(Node::AlterTable { name, operations }, |d| {
                for operation in operations {
                    d.alter_table_operation(operation);
                }
            }),
            Statement::CreateIndex(index) => d.scoped(Node::CreateIndex(index), |_| {}),
            Statement::Drop {
                object_type,
                names,
                if_exists,
                ..
            } => d.scoped(
                Node::Drop {
                    object_type,
                    names,
                    if_exists: *if_exists,
                },
                |_| {},
            ),
            Statement::Commit { .. } => d.scoped(Node::Commit, |_| {}),
            _ => {}
        });
    }

    fn alter_table_operation(&mut self, operation: &AlterTableOperation) {
        self.scoped(Node::AlterTableOperation(operation), |d| match operation {
            AlterTableOperation::AddConstraint { constraint, .. } => {
                d.scoped(Node::TableConstraint(constraint), |_| {})
            }
            AlterTableOperation::AddColumn { column_def, .. } => d.column_def(column_def),
            _ => {}
        });
    }

    fn column_def(&mut self, column: &ColumnDef) {
        self.scoped(Node::ColumnDef(column), |d| {
            for option in &column.options {
                d.scoped(Node::ColumnOption(option), |_| {});
            }
        });
    }

    fn query(&mut self, query: &Query) {
        self.scoped(Node::Query(query), |d| {
            if let Some(with) = &query.with {
                for cte in &with.cte_tables {
                    d.query(&cte.query);
                }
            }
            d.set_expr(&query.body);
            if let Some(order_by) = &query.order_by {
                if let OrderByKind::Expressions(exprs) = &order_by.kind {
                    for order_by_expr in exprs {
                        d.order_by_expr(order_by_expr);
                    }
                }
            }
        });
    }

    fn set_expr(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => self.select(select),
            SetExpr::Query(query) => self.query(query),
            SetExpr::SetOperation {
                op, left, right, ..
            } => self.scoped(Node::SetOperation { op, left, right }, |d| {
                d.set_expr(left);
                d.set_expr(right);
            }),
            SetExpr::Values(values) => {
                for row in &values.rows {
                    for expr in row {
                        self.expr(expr);
                    }
                }
            }
            SetExpr::Insert(statement)
            | SetExpr::Update(statement)
            | SetExpr::Delete(statement) => self.statement(statement),
            _ => {}
        }
    }

    fn select(&mut self, select: &Select) {
        self.scoped(Node::Select(select), |d| {
            for item in &select.projection {
                d.select_item(item);
            }
            for table in &select.from {
                d.table_with_joins(table);
            }
            if let Some(selection) = &select.selection {
                d.expr(selection);
            }
            if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
                for expr in exprs {
                    d.expr(expr);
                }
            }
            d.exprs(&select.having);
            d.exprs(&select.qualify);
        });
    }

    fn select_item(&mut self, item: &SelectItem) {
        self.scoped(Node::SelectItem(item), |d| {
            if let SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } = item {
                d.expr(expr);
            }
        });
    }

    fn table_with_joins(&mut self, table: &TableWithJoins) {
        self.table_factor(&table.relation);
        for join in &table.joins {
            self.table_factor(&join.relation);
            if let Some(JoinConstraint::On(expr)) = join_constraint(&join.join_operator) {
                self.expr(expr);
            }
        }
    }

    fn table_factor(&mut self, factor: &TableFactor) {
        self.scoped(Node::TableFactor(factor), |d| match factor {
            TableFactor::Derived { subquery, .. } => d.query(subquery),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => d.table_with_joins(table_with_joins),
            _ => {}
        });
    }

    fn order_by_expr(&mut self, order_by: &OrderByExpr) {
        self.scoped(Node::OrderByExpr(order_by), |d| d.expr(&order_by.expr));
    }

    fn expr(&mut self, expr: &Expr) {
        self.scoped(Node::Expr(expr), |d| d.expr_children(expr));
    }

    fn exprs<'e>(&mut self, exprs: impl IntoIterator<Item = &'e Expr>) {
        for expr in exprs {
            self.expr(expr);
        }
    }

    fn expr_children(&mut self, expr: &Expr) {
        match expr {
            Expr::BinaryOp { left, right, .. }
            | Expr::AnyOp { left, right, .. }
            | Expr::AllOp { left, right, .. }
            | Expr::IsDistinctFrom(left, right)
            | Expr::IsNotDistinctFrom(left, right)
            | Expr::InUnnest {
                expr: left,
                array_expr: right,
                ..
            }
            | Expr::Position {
                expr: left,
                r#in: right,
            }
            | Expr::AtTimeZone {
                timestamp: left,
                time_zone: right,
            } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::MemberOf(member) => {
                self.expr(&member.value);
                self.expr(&member.array);
            }
            Expr::UnaryOp { expr: inner, .. }
            | Expr::Nested(inner)
            | Expr::Cast { expr: inner, .. }
            | Expr::IsNull(inner)
            | Expr::IsNotNull(inner)
            | Expr::IsTrue(inner)
            | Expr::IsNotTrue(inner)
            | Expr::IsFalse(inner)
            | Expr::IsNotFalse(inner)
            | Expr::IsUnknown(inner)
            | Expr::IsNotUnknown(inner)
            | Expr::IsNormalized { expr: inner, .. }
            | Expr::Collate { expr: inner, .. }
            | Expr::Extract { expr: inner, .. }
            | Expr::Ceil { expr: inner, .. }
            | Expr::Floor { expr: inner, .. }
            | Expr::Prefixed { value: inner, .. }
            | Expr::Named { expr: inner, .. }
            | Expr::OuterJoin(inner)
            | Expr::Prior(inner) => self.expr(inner),
            Expr::Interval(interval) => self.expr(&interval.value),
            Expr::Lambda(lambda) => self.expr(&lambda.body),
            Expr::Like { expr, pattern, .. }
            | Expr::ILike { expr, pattern, .. }
            | Expr::SimilarTo { expr, pattern, .. }
            | Expr::RLike { expr, pattern, .. } => {
                self.expr(expr);
                self.expr(pattern);
            }
            Expr::Convert { expr, styles, .. } => {
                self.expr(expr);
                self.exprs(styles);
            }
            Expr::Substring {
                expr,
                substring_from,
                substring_for,
                ..
            } => {
                self.expr(expr);
                self.exprs(substring_from.as_deref());
                self.exprs(substring_for.as_deref());
            }
            Expr::Trim {
                expr,
                trim_what,
                trim_characters,
                ..
            } => {
                self.exprs(trim_what.as_deref());
                self.expr(expr);
                self.exprs(trim_characters.iter().flatten());
            }
            Expr::Overlay {
                expr,
                overlay_what,
                overlay_from,
                overlay_for,
            } => {
                self.expr(expr);
                self.expr(overlay_what);
                self.expr(overlay_from);
                self.exprs(overlay_for.as_deref());
            }
            Expr::CompoundFieldAccess { root, access_chain } => {
                self.expr(root);
                for access in access_chain {
                    match access {
                        AccessExpr::Dot(expr) => self.expr(expr),
                        AccessExpr::Subscript(subscript) => self.subscript(subscript),
                    }
                }
            }
            Expr::JsonAccess { value, path } => {
                self.expr(value);
                for element in &path.path {
                    if let JsonPathElem::Bracket { key } = element {
                        self.expr(key);
                    }
                }
            }
            Expr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                self.exprs(operand.as_deref());
                for case_when in conditions {
                    self.expr(&case_when.condition);
                    self.expr(&case_when.result);
                }
                self.exprs(else_result.as_deref());
            }
            Expr::Function(func) => self.function(func),
            Expr::InSubquery {
                expr: inner,
                subquery,
                ..
            } => {
                self.expr(inner);
                self.query(subquery);
            }
            Expr::Subquery(subquery) | Expr::Exists { subquery, .. } => self.query(subquery),
            Expr::Between {
                expr, low, high, ..
            } => {
                self.expr(expr);
                self.expr(low);
                self.expr(high);
            }
            Expr::InList { expr, list, .. } => {
                self.expr(expr);
                self.exprs(list);
            }
            Expr::Tuple(items) | Expr::Struct { values: items, .. } => self.exprs(items),
            Expr::Array(array) => self.exprs(&array.elem),
            Expr::GroupingSets(sets) | Expr::Cube(sets) | Expr::Rollup(sets) => {
                self.exprs(sets.iter().flatten())
            }
            Expr::Dictionary(fields) => self.exprs(fields.iter().map(|field| &*field.value)),
            Expr::Map(map) => {
                for entry in &map.entries {
                    self.expr(&entry.key);
                    self.expr(&entry.value);
                }
            }
            // Leaves.
            Expr::Identifier(_)
            | Expr::CompoundIdentifier(_)
            | Expr::Value(_)
            | Expr::TypedString(_)
            | Expr::MatchAgainst { .. }
            | Expr::Wildcard(_)
            | Expr::QualifiedWildcard(..) => {}
        }
    }

    fn subscript(&mut self, subscript: &Subscript) {
        match subscript {
            Subscript::Index { index } => self.expr(index),
            Subscript::Slice {
                lower_bound,
                upper_bound,
                stride,
            } => {
                self.exprs(lower_bound);
                self.exprs(upper_bound);
                self.exprs(stride);
            }
        }
    }

    fn function(&mut self, func: &Function) {
        for args in [&func.parameters, &func.args] {
            match args {
                FunctionArguments::Subquery(query) => self.query(query),
                FunctionArguments::List(arg_list) => {
                    for arg in &arg_list.args {
                        match arg {
                            FunctionArg::Unnamed(arg) | FunctionArg::Named { arg, .. } => {
                                self.function_arg(arg)
                            }
                            FunctionArg::ExprNamed { name, arg, .. } => {
                                self.expr(name);
                                self.function_arg(arg);
                            }
                        }
                    }
                }
                FunctionArguments::None => {}
            }
        }
        self.exprs(func.filter.as_deref());
        for order_by in &func.within_group {
            self.order_by_expr(order_by);
        }
    }

    fn function_arg(&mut self, arg: &FunctionArgExpr) {
        if let FunctionArgExpr::Expr(expr) = arg {
            self.expr(expr);
        }
    }
}

fn join_constraint(op: &JoinOperator) -> Option<&JoinConstraint> {
    match op {
        JoinOperator::Join(c)
        | JoinOperator::Inner(c)
        | JoinOperator::Left(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::Right(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c)
        | JoinOperator::CrossJoin(c)
        | JoinOperator::Semi(c)
        | JoinOperator::LeftSemi(c)
        | JoinOperator::RightSemi(c)
        | JoinOperator::Anti(c)
        | JoinOperator::LeftAnti(c)
        | JoinOperator::RightAnti(c)
        | JoinOperator::StraightJoin(c) => Some(c),
        JoinOperator::AsOf { constraint, .. } => Some(constraint),
        JoinOperator::CrossApply | JoinOperator::OuterApply => None,
    }
}

fn failure(result: Result<Result<(), RuleError>, Box<dyn Any + Send>>) -> Option<String> {
    match result {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err.to_string()),
        Err(payload) => Some(panic_message(payload)),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

fn fault(slot: &mut RuleSlot, faults: &mut Vec<Advice>, origin: StatementOrigin, message: String) {
    slot.faulted = true;
    let name = slot.rule.name();

    #[cfg(feature = "tracing")]
    warn!(rule = name, statement = origin.index, "rule disabled after fault: {message}");

    faults.push(internal_error(name, &message, origin.absolute(Position::new(1, 1))));
}

/// Advice for a rule whose factory panicked; the rule never runs.
pub(crate) fn factory_fault(kind: RuleKind, payload: Box<dyn Any + Send>, position: Position) -> Advice {
    let name = kind.as_str();
    let message = panic_message(payload);

    #[cfg(feature = "tracing")]
    warn!(rule = name, "rule factory faulted: {message}");

    internal_error(name, &message, position)
}

fn internal_error(name: &str, message: &str, position: Position) -> Advice {
    Advice::error(
        advice_codes::INTERNAL,
        name,
        format!("Internal error in rule {name}: {message}"),
    )
    .with_position(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::node::NodeKind;
    use crate::advisor::rule::RuleBase;
    use crate::parser::parse_statements;
    use crate::types::{AdviceStatus, Dialect};

    /// Records the order callbacks arrive in.
    struct Trace {
        base: RuleBase,
        label: &'static str,
        log: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl Rule for Trace {
        fn base(&self) -> &RuleBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut RuleBase {
            &mut self.base
        }

        fn interested_in(&self, kind: NodeKind) -> bool {
            matches!(kind, NodeKind::Select | NodeKind::Query)
        }

        fn on_enter(&mut self, _node: Node<'_>, kind: NodeKind) -> Result<(), RuleError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}>{}", self.label, kind.as_str()));
            Ok(())
        }

        fn on_exit(&mut self, _node: Node<'_>, kind: NodeKind) -> Result<(), RuleError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}<{}", self.label, kind.as_str()));
            Ok(())
        }
    }

    struct Exploding {
        base: RuleBase,
    }

    impl Rule for Exploding {
        fn base(&self) -> &RuleBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut RuleBase {
            &mut self.base
        }

        fn on_enter(&mut self, _node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
            panic!("boom");
        }
    }

    struct Picky {
        base: RuleBase,
    }

    impl Rule for Picky {
        fn base(&self) -> &RuleBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut RuleBase {
            &mut self.base
        }

        fn interested_in(&self, _kind: NodeKind) -> bool {
            panic!("cannot decide");
        }
    }

    fn parsed(sql: &str) -> Vec<ParsedStatement> {
        parse_statements(sql, Dialect::Postgres).unwrap()
    }

    #[test]
    fn rules_see_enter_and_exit_in_registration_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let rules: Vec<Box<dyn Rule>> = ["a", "b"]
            .into_iter()
            .map(|label| {
                Box::new(Trace {
                    base: RuleBase::new(AdviceStatus::Warning, "trace"),
                    label,
                    log: Arc::clone(&log),
                }) as Box<dyn Rule>
            })
            .collect();
        let mut dispatcher = Dispatcher::new(rules);

        for statement in parsed("SELECT 1") {
            dispatcher.walk(&statement);
        }

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                "a>Query", "b>Query", "a>Select", "b>Select", "a<Select", "b<Select", "a<Query",
                "b<Query",
            ]
        );
    }

    #[test]
    fn panicking_rule_is_reported_once_and_skipped() {
        let mut dispatcher = Dispatcher::new(vec![Box::new(Exploding {
            base: RuleBase::new(AdviceStatus::Warning, "exploding"),
        })]);

        for statement in parsed("SELECT 1;\nSELECT 2") {
            dispatcher.walk(&statement);
        }
        dispatcher.finish();

        let advice = dispatcher.drain();
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].code, advice_codes::INTERNAL);
        assert_eq!(advice[0].title, "exploding");
        assert_eq!(advice[0].line, Some(1));
        assert!(advice[0].content.contains("boom"));
    }

    #[test]
    fn panicking_interest_check_is_isolated() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut dispatcher = Dispatcher::new(vec![
            Box::new(Picky {
                base: RuleBase::new(AdviceStatus::Warning, "picky"),
            }),
            Box::new(Trace {
                base: RuleBase::new(AdviceStatus::Warning, "trace"),
                label: "t",
                log: Arc::clone(&log),
            }),
        ]);

        for statement in parsed("SELECT 1") {
            dispatcher.walk(&statement);
        }

        let advice = dispatcher.drain();
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].title, "picky");
        assert!(advice[0].content.contains("cannot decide"));
        assert_eq!(log.lock().unwrap().len(), 4);
    }
}
