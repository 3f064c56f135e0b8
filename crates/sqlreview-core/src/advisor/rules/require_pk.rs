//! table.require-pk: every table the batch creates must end up with a
//! primary key.
//!
//! A scope frame is pushed for each CREATE TABLE and ALTER TABLE and popped
//! on exit. Closed frames update a batch-wide table list so a key added by a
//! later ALTER TABLE still counts. Findings are emitted once the batch ends.
//!
//! `DROP CONSTRAINT` clears the key only when the name matches the table's
//! primary key, declared earlier in the batch or found in the snapshot.
//! `DROP COLUMN` clears it when the replayed schema ends without one.

use crate::advisor::helpers::{is_primary_key_option, primary_key_name, TableKey};
use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase, StatementOrigin};
use crate::error::{ConfigError, RuleError};
use crate::types::{advice_codes, DatabaseSchema, Dialect};
use sqlparser::ast::{AlterTableOperation, Ident, ObjectName, ObjectType, TableConstraint};
use std::collections::{HashMap, HashSet};

/// `(schema, table)` folded to lower case.
type TableSlot = (String, String);

fn slot(key: &TableKey) -> TableSlot {
    (
        key.schema.as_deref().unwrap_or_default().to_lowercase(),
        key.table.to_lowercase(),
    )
}

/// Primary key name per table that has one.
fn primary_keys(schema: Option<&DatabaseSchema>) -> HashMap<TableSlot, String> {
    let mut keys = HashMap::new();
    for schema in schema.into_iter().flat_map(|database| &database.schemas) {
        for table in &schema.tables {
            if let Some(index) = table.primary_key() {
                keys.insert(
                    (schema.name.to_lowercase(), table.name.to_lowercase()),
                    index.name.clone(),
                );
            }
        }
    }
    keys
}

fn keyless_tables(schema: Option<&DatabaseSchema>) -> HashSet<TableSlot> {
    let mut keyless = HashSet::new();
    for schema in schema.into_iter().flat_map(|database| &database.schemas) {
        for table in schema.tables.iter().filter(|table| table.primary_key().is_none()) {
            keyless.insert((schema.name.to_lowercase(), table.name.to_lowercase()));
        }
    }
    keyless
}

struct Scope {
    key: TableKey,
    display: String,
    creates: bool,
    /// Primary key state after the statement: `Some(true)` added,
    /// `Some(false)` dropped (or never declared for CREATE), `None` untouched.
    primary_key: Option<bool>,
    primary_key_name: Option<String>,
}

struct TrackedTable {
    key: TableKey,
    display: String,
    has_primary_key: bool,
    primary_key_name: Option<String>,
    origin: StatementOrigin,
}

pub struct RequirePk {
    base: RuleBase,
    dialect: Dialect,
    current_database: Option<String>,
    current_schema: Option<String>,
    /// Keys present before the batch.
    snapshot_keys: HashMap<TableSlot, String>,
    /// Tables left without a key once the batch is replayed.
    keyless_after: HashSet<TableSlot>,
    scopes: Vec<Scope>,
    tables: Vec<TrackedTable>,
}

impl RequirePk {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self {
            base: ctx.rule_base(),
            dialect: ctx.dialect,
            current_database: ctx.current_database.map(str::to_string),
            current_schema: ctx.current_schema.map(str::to_string),
            snapshot_keys: primary_keys(ctx.schema),
            keyless_after: keyless_tables(ctx.final_schema),
            scopes: Vec::new(),
            tables: Vec::new(),
        }))
    }

    fn key(&self, name: &ObjectName) -> Option<TableKey> {
        TableKey::resolve(
            name,
            self.dialect,
            self.current_database.as_deref(),
            self.current_schema.as_deref(),
        )
    }

    fn open(&mut self, name: &ObjectName, creates: bool) {
        let Some(key) = self.key(name) else {
            return;
        };
        let display = name
            .0
            .last()
            .and_then(|part| part.as_ident())
            .map_or_else(|| key.table.clone(), |ident| ident.value.clone());
        self.scopes.push(Scope {
            key,
            display,
            creates,
            primary_key: creates.then_some(false),
            primary_key_name: None,
        });
    }

    fn close(&mut self, kind: NodeKind) -> Result<(), RuleError> {
        let scope = self.scopes.pop().ok_or(RuleError::ScopeUnderflow {
            kind: kind.as_str(),
        })?;
        let origin = self.base.origin();

        if scope.creates {
            self.tables.retain(|table| table.key != scope.key);
            self.tables.push(TrackedTable {
                key: scope.key,
                display: scope.display,
                has_primary_key: scope.primary_key == Some(true),
                primary_key_name: scope.primary_key_name,
                origin,
            });
            return Ok(());
        }

        let Some(has_primary_key) = scope.primary_key else {
            return Ok(());
        };
        match self.tables.iter_mut().find(|table| table.key == scope.key) {
            Some(table) => {
                table.has_primary_key = has_primary_key;
                table.primary_key_name = scope.primary_key_name;
                table.origin = origin;
            }
            // Dropping the key of a table created outside this batch.
            None if !has_primary_key => self.tables.push(TrackedTable {
                key: scope.key,
                display: scope.display,
                has_primary_key,
                primary_key_name: None,
                origin,
            }),
            None => {}
        }
        Ok(())
    }

    fn set_primary_key(&mut self, present: bool, declared: Option<&Ident>) {
        let dialect = self.dialect;
        if let Some(scope) = self.scopes.last_mut() {
            scope.primary_key = Some(present);
            scope.primary_key_name = present.then(|| {
                primary_key_name(
                    dialect,
                    &scope.key.table,
                    declared.map(|ident| dialect.normalize_identifier(ident)),
                )
            });
        }
    }

    /// Current primary key name of the table in the innermost scope.
    fn current_key_name(&self) -> Option<&str> {
        let scope = self.scopes.last()?;
        if let Some(present) = scope.primary_key {
            return scope.primary_key_name.as_deref().filter(|_| present);
        }
        match self.tables.iter().find(|table| table.key == scope.key) {
            Some(table) => table.primary_key_name.as_deref().filter(|_| table.has_primary_key),
            None => self.snapshot_keys.get(&slot(&scope.key)).map(String::as_str),
        }
    }

    fn drops_primary_key(&self, constraint: &Ident) -> bool {
        let constraint = self.dialect.normalize_identifier(constraint);
        self.current_key_name()
            .is_some_and(|name| self.dialect.names_match(name, &constraint))
    }

    fn loses_primary_key(&self) -> bool {
        self.scopes.last().is_some_and(|scope| {
            self.current_key_name().is_some() && self.keyless_after.contains(&slot(&scope.key))
        })
    }
}

impl Rule for RequirePk {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        matches!(
            kind,
            NodeKind::CreateTable
                | NodeKind::AlterTable
                | NodeKind::AlterTableOperation
                | NodeKind::ColumnOption
                | NodeKind::TableConstraint
                | NodeKind::Drop
        )
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        match node {
            Node::CreateTable(create) => self.open(&create.name, true),
            Node::AlterTable { name, .. } => self.open(name, false),
            Node::ColumnOption(option) if is_primary_key_option(&option.option) => {
                self.set_primary_key(true, option.name.as_ref())
            }
            Node::TableConstraint(TableConstraint::PrimaryKey { name, .. }) => {
                self.set_primary_key(true, name.as_ref())
            }
            Node::AlterTableOperation(AlterTableOperation::DropPrimaryKey { .. }) => {
                self.set_primary_key(false, None)
            }
            Node::AlterTableOperation(AlterTableOperation::DropConstraint { name, .. })
                if self.drops_primary_key(name) =>
            {
                self.set_primary_key(false, None)
            }
            Node::AlterTableOperation(AlterTableOperation::DropColumn { .. })
                if self.loses_primary_key() =>
            {
                self.set_primary_key(false, None)
            }
            Node::Drop {
                object_type: ObjectType::Table,
                names,
                ..
            } => {
                for name in names {
                    if let Some(key) = self.key(name) {
                        self.tables.retain(|table| table.key != key);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn on_exit(&mut self, node: Node<'_>, kind: NodeKind) -> Result<(), RuleError> {
        match node {
            Node::CreateTable(_) | Node::AlterTable { .. } => self.close(kind),
            _ => Ok(()),
        }
    }

    fn reset(&mut self) {
        self.scopes.clear();
    }

    fn finish(&mut self) -> Result<(), RuleError> {
        for table in std::mem::take(&mut self.tables) {
            if !table.has_primary_key {
                self.base.report_at(
                    table.origin,
                    advice_codes::TABLE_NO_PK,
                    format!("Table `{}` requires PRIMARY KEY", table.display),
                    None,
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::advisor::rule::RuleKind;
    use crate::advisor::rules::testing::{run, run_with, Harness};
    use crate::types::{ColumnMetadata, DatabaseSchema, Dialect, IndexMetadata, SchemaMetadata, TableMetadata};
    use rstest::rstest;

    #[rstest]
    #[case("CREATE TABLE t (id int PRIMARY KEY)")]
    #[case("CREATE TABLE t (id int, PRIMARY KEY (id))")]
    #[case("CREATE TABLE t (id int, CONSTRAINT pk_t PRIMARY KEY (id))")]
    #[case("CREATE TABLE t (id int);\nALTER TABLE t ADD PRIMARY KEY (id)")]
    #[case("CREATE TABLE t (id int);\nALTER TABLE t ADD CONSTRAINT pk_t PRIMARY KEY (id)")]
    #[case("CREATE TABLE t (id int);\nDROP TABLE t")]
    fn tables_with_primary_key_pass(#[case] sql: &str) {
        assert!(run(RuleKind::TableRequirePk, sql).is_empty());
    }

    #[test]
    fn one_advice_per_table_without_key() {
        let sql = "CREATE TABLE a (id int);\n\
                   CREATE TABLE b (id int PRIMARY KEY);\n\
                   CREATE TABLE c (id int, name text)";
        let advice = run(RuleKind::TableRequirePk, sql);
        let found: Vec<_> = advice
            .iter()
            .map(|advice| (advice.content.as_str(), advice.line))
            .collect();
        assert_eq!(
            found,
            vec![
                ("Table `a` requires PRIMARY KEY", Some(1)),
                ("Table `c` requires PRIMARY KEY", Some(3)),
            ]
        );
    }

    #[test]
    fn drop_constraint_does_not_touch_other_tables() {
        let sql = "CREATE TABLE a (id int PRIMARY KEY);\n\
                   ALTER TABLE b DROP CONSTRAINT b_pkey;\n\
                   CREATE TABLE c (id int, PRIMARY KEY (id))";
        assert!(run(RuleKind::TableRequirePk, sql).is_empty());
    }

    #[test]
    fn dropping_primary_key_is_reported() {
        let advice = run_with(
            Dialect::Mysql,
            RuleKind::TableRequirePk,
            "ALTER TABLE orders DROP PRIMARY KEY",
        );
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].content, "Table `orders` requires PRIMARY KEY");
    }

    fn orders_snapshot() -> DatabaseSchema {
        DatabaseSchema {
            name: "shop".to_string(),
            schemas: vec![SchemaMetadata {
                name: "public".to_string(),
                tables: vec![TableMetadata {
                    name: "orders".to_string(),
                    columns: ["id", "amount"]
                        .into_iter()
                        .map(|name| ColumnMetadata {
                            name: name.to_string(),
                            data_type: None,
                            nullable: name != "id",
                        })
                        .collect(),
                    indexes: vec![IndexMetadata {
                        name: "orders_pk".to_string(),
                        expressions: vec!["id".to_string()],
                        unique: true,
                        primary: true,
                    }],
                }],
            }],
        }
    }

    #[rstest]
    #[case("CREATE TABLE t (id int PRIMARY KEY);\nALTER TABLE t DROP CONSTRAINT t_pkey")]
    #[case("CREATE TABLE t (id int, CONSTRAINT pk_t PRIMARY KEY (id));\nALTER TABLE t DROP CONSTRAINT pk_t")]
    #[case("CREATE TABLE t (id int);\nALTER TABLE t ADD CONSTRAINT Pk_T PRIMARY KEY (id);\nALTER TABLE t DROP CONSTRAINT pk_t")]
    fn dropping_primary_key_constraint_is_reported(#[case] sql: &str) {
        let advice = run(RuleKind::TableRequirePk, sql);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].content, "Table `t` requires PRIMARY KEY");
        assert_eq!(advice[0].line, Some(sql.lines().count()));
    }

    #[test]
    fn dropping_other_constraints_keeps_the_key() {
        let sql = "CREATE TABLE t (id int PRIMARY KEY, code int, CONSTRAINT t_code UNIQUE (code));\n\
                   ALTER TABLE t DROP CONSTRAINT t_code";
        assert!(run(RuleKind::TableRequirePk, sql).is_empty());
    }

    #[test]
    fn snapshot_primary_key_name_is_resolved() {
        let snapshot = orders_snapshot();
        let harness = Harness {
            schema: Some(&snapshot),
            ..Harness::default()
        };

        let advice = harness.run(
            RuleKind::TableRequirePk,
            "ALTER TABLE orders DROP CONSTRAINT orders_pk",
        );
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].content, "Table `orders` requires PRIMARY KEY");

        assert!(harness
            .run(RuleKind::TableRequirePk, "ALTER TABLE orders DROP CONSTRAINT orders_amount_check")
            .is_empty());
    }

    #[test]
    fn dropping_key_column_uses_replayed_schema() {
        let snapshot = orders_snapshot();
        let harness = Harness {
            schema: Some(&snapshot),
            ..Harness::default()
        };

        let advice = harness.run(
            RuleKind::TableRequirePk,
            "CREATE TABLE audit (id int PRIMARY KEY, note text);\nALTER TABLE audit DROP COLUMN id",
        );
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].content, "Table `audit` requires PRIMARY KEY");
        assert_eq!(advice[0].line, Some(2));

        assert!(harness
            .run(RuleKind::TableRequirePk, "ALTER TABLE orders DROP COLUMN amount")
            .is_empty());
    }

    #[test]
    fn state_does_not_leak_into_next_statement() {
        // The column-level key in the first statement must not satisfy the
        // second table.
        let sql = "CREATE TABLE a (id int PRIMARY KEY);\nCREATE TABLE b (id int)";
        let advice = run(RuleKind::TableRequirePk, sql);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].line, Some(2));
    }
}
