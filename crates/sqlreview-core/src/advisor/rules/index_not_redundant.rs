//! index.not-redundant: a new index must not share its leading column with an
//! index the table already has.
//!
//! Only the first key column is compared, so `(a)` is redundant next to
//! `(a, b, c)`, but so is `(a, d)`. Longer common prefixes are not examined.

use crate::advisor::helpers::{index_column_name, object_base_name, object_schema_name, unquote, TableKey};
use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, RuleError};
use crate::types::{advice_codes, DatabaseSchema, Dialect};
use std::collections::HashMap;

/// `(schema, table)` folded to lower case.
type TableIndexKey = (String, String);

#[derive(Debug, Clone)]
struct KnownIndex {
    name: String,
    leading_column: String,
}

pub struct IndexNotRedundant {
    base: RuleBase,
    dialect: Dialect,
    current_database: Option<String>,
    current_schema: Option<String>,
    indexes: HashMap<TableIndexKey, Vec<KnownIndex>>,
}

fn normalize_column(column: &str) -> String {
    unquote(column).to_lowercase()
}

fn seed(schema: Option<&DatabaseSchema>) -> HashMap<TableIndexKey, Vec<KnownIndex>> {
    let mut indexes: HashMap<TableIndexKey, Vec<KnownIndex>> = HashMap::new();
    let Some(database) = schema else {
        return indexes;
    };
    for schema in &database.schemas {
        for table in &schema.tables {
            let known: Vec<KnownIndex> = table
                .indexes
                .iter()
                .filter_map(|index| {
                    let leading = index.expressions.first()?;
                    Some(KnownIndex {
                        name: index.name.clone(),
                        leading_column: normalize_column(leading),
                    })
                })
                .collect();
            if !known.is_empty() {
                indexes
                    .entry((schema.name.to_lowercase(), table.name.to_lowercase()))
                    .or_default()
                    .extend(known);
            }
        }
    }
    indexes
}

impl IndexNotRedundant {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self {
            base: ctx.rule_base(),
            dialect: ctx.dialect,
            current_database: ctx.current_database.map(str::to_string),
            current_schema: ctx.current_schema.map(str::to_string),
            indexes: seed(ctx.schema),
        }))
    }

    fn schema_for(&self, written: Option<String>) -> String {
        written
            .or_else(|| self.current_schema.clone())
            .or_else(|| self.dialect.default_schema().map(str::to_string))
            .unwrap_or_default()
            .to_lowercase()
    }
}

impl Rule for IndexNotRedundant {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        kind == NodeKind::CreateIndex
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        let Node::CreateIndex(index) = node else {
            return Ok(());
        };
        let reference = TableKey::resolve(
            &index.table_name,
            self.dialect,
            self.current_database.as_deref(),
            self.current_schema.as_deref(),
        );
        if reference.is_some_and(|key| {
            key.is_other_database(self.dialect, self.current_database.as_deref())
        }) {
            return Ok(());
        }

        let Some(table) = object_base_name(&index.table_name, self.dialect) else {
            return Ok(());
        };
        let schema = self.schema_for(object_schema_name(&index.table_name, self.dialect));
        let key = (schema, table.to_lowercase());
        let Some(leading) = index.columns.first() else {
            return Ok(());
        };
        let leading_column = normalize_column(&index_column_name(leading, self.dialect));
        let name = index
            .name
            .as_ref()
            .and_then(|name| object_base_name(name, self.dialect))
            .unwrap_or_default();

        let existing = self.indexes.entry(key).or_default();
        if let Some(found) = existing
            .iter()
            .find(|known| known.leading_column == leading_column)
        {
            let content = format!(
                "Redundant indexes with the same prefix (`{}` and `{}`) in `{}` is not allowed",
                found.name, name, table
            );
            self.base
                .report(advice_codes::REDUNDANT_INDEX, content, node.position());
        }
        existing.push(KnownIndex {
            name,
            leading_column,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::advisor::rule::RuleKind;
    use crate::advisor::rules::testing::Harness;
    use crate::types::{DatabaseSchema, Dialect, IndexMetadata, SchemaMetadata, TableMetadata};

    fn schema(schema_name: &str) -> DatabaseSchema {
        DatabaseSchema {
            name: "shop".to_string(),
            schemas: vec![SchemaMetadata {
                name: schema_name.to_string(),
                tables: vec![TableMetadata {
                    name: "orders".to_string(),
                    columns: Vec::new(),
                    indexes: vec![IndexMetadata {
                        name: "idx_abc".to_string(),
                        expressions: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                        unique: false,
                        primary: false,
                    }],
                }],
            }],
        }
    }

    fn run(dialect: Dialect, snapshot: &DatabaseSchema, sql: &str) -> usize {
        Harness {
            dialect,
            schema: Some(snapshot),
            current_database: Some("shop"),
            ..Harness::default()
        }
        .run(RuleKind::IndexNotRedundant, sql)
        .len()
    }

    #[test]
    fn leading_column_match_is_redundant() {
        let snapshot = schema("public");
        assert_eq!(run(Dialect::Postgres, &snapshot, "CREATE INDEX idx_a ON orders (a)"), 1);
    }

    #[test]
    fn different_leading_column_is_not_redundant() {
        let snapshot = schema("public");
        assert_eq!(run(Dialect::Postgres, &snapshot, "CREATE INDEX idx_b ON orders (b)"), 0);
    }

    #[test]
    fn only_first_column_is_compared() {
        // (a, d) shares nothing beyond `a` with (a, b, c) yet is still flagged,
        // while (b, c) is a suffix and is not.
        let snapshot = schema("public");
        assert_eq!(run(Dialect::Postgres, &snapshot, "CREATE INDEX i ON orders (a, d)"), 1);
        assert_eq!(run(Dialect::Postgres, &snapshot, "CREATE INDEX i ON orders (b, c)"), 0);
    }

    #[test]
    fn tsql_falls_back_to_dbo_and_ignores_case() {
        let snapshot = schema("dbo");
        assert_eq!(run(Dialect::Mssql, &snapshot, "CREATE INDEX i ON Orders ([A])"), 1);
        assert_eq!(run(Dialect::Mssql, &snapshot, "CREATE INDEX i ON sales.orders (a)"), 0);
    }

    #[test]
    fn other_database_is_skipped() {
        let snapshot = schema("");
        assert_eq!(run(Dialect::Mysql, &snapshot, "CREATE INDEX i ON orders (a)"), 1);
        assert_eq!(run(Dialect::Mysql, &snapshot, "CREATE INDEX i ON archive.orders (a)"), 0);
    }

    #[test]
    fn indexes_created_earlier_in_the_batch_count() {
        let empty = DatabaseSchema::default();
        assert_eq!(
            run(
                Dialect::Postgres,
                &empty,
                "CREATE INDEX i1 ON t (x, y);\nCREATE INDEX i2 ON t (x)"
            ),
            1
        );
    }
}
