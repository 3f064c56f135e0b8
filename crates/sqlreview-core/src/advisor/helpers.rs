//! Name resolution shared by rules and the walk-through.

use crate::types::Dialect;
use sqlparser::ast::{ColumnOption, Expr, Ident, IndexColumn, ObjectName, TableConstraint};
use std::fmt;

/// A table reference resolved to `database.schema.table`.
///
/// Every part is folded with the dialect's identifier rules so keys compare
/// with plain equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub table: String,
}

impl TableKey {
    /// Resolves `name`, filling omitted qualifiers from the session defaults.
    ///
    /// MySQL has no schema level, so a two-part name is `database.table`
    /// there and `schema.table` everywhere else.
    pub fn resolve(
        name: &ObjectName,
        dialect: Dialect,
        current_database: Option<&str>,
        current_schema: Option<&str>,
    ) -> Option<Self> {
        let parts: Vec<String> = name
            .0
            .iter()
            .filter_map(|part| part.as_ident())
            .map(|ident| dialect.normalize_identifier(ident))
            .collect();

        let fold = |value: &str| dialect.fold_unquoted(value);
        let default_schema = || {
            current_schema
                .map(fold)
                .or_else(|| dialect.default_schema().map(fold))
        };
        let default_database = || current_database.map(fold);

        let (database, schema, table) = match parts.as_slice() {
            [] => return None,
            [table] => (default_database(), default_schema(), table.clone()),
            [qualifier, table] if dialect == Dialect::Mysql => {
                (Some(qualifier.clone()), None, table.clone())
            }
            [schema, table] => (default_database(), Some(schema.clone()), table.clone()),
            [.., database, schema, table] => {
                (Some(database.clone()), Some(schema.clone()), table.clone())
            }
        };

        let schema = if dialect == Dialect::Mysql { None } else { schema };
        Some(Self {
            database,
            schema,
            table,
        })
    }

    /// True when the reference names a database other than `current`.
    pub fn is_other_database(&self, dialect: Dialect, current: Option<&str>) -> bool {
        match (&self.database, current) {
            (Some(database), Some(current)) => {
                !dialect.names_match(database, &dialect.fold_unquoted(current))
            }
            _ => false,
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(database) = &self.database {
            write!(f, "{database}.")?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "{schema}.")?;
        }
        f.write_str(&self.table)
    }
}

/// Last part of an object name, folded for the dialect.
pub fn object_base_name(name: &ObjectName, dialect: Dialect) -> Option<String> {
    name.0
        .last()
        .and_then(|part| part.as_ident())
        .map(|ident| dialect.normalize_identifier(ident))
}

/// Schema qualifier of an object name, if written.
pub fn object_schema_name(name: &ObjectName, dialect: Dialect) -> Option<String> {
    let idents: Vec<&Ident> = name.0.iter().filter_map(|part| part.as_ident()).collect();
    if dialect == Dialect::Mysql || idents.len() < 2 {
        return None;
    }
    idents
        .get(idents.len() - 2)
        .map(|ident| dialect.normalize_identifier(ident))
}

/// Name of an index key when it is a plain column reference.
pub fn index_column_name(column: &IndexColumn, dialect: Dialect) -> String {
    expr_column_name(&column.column.expr, dialect)
}

/// Column referenced by `expr`, or its text for anything else.
pub fn expr_column_name(expr: &Expr, dialect: Dialect) -> String {
    match expr {
        Expr::Identifier(ident) => dialect.normalize_identifier(ident),
        Expr::CompoundIdentifier(idents) => idents
            .last()
            .map(|ident| dialect.normalize_identifier(ident))
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Strips quoting characters so `"a"`, `` `a` `` and `[a]` compare equal.
pub fn unquote(name: &str) -> &str {
    let trimmed = name.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next_back()) {
        (Some('"'), Some('"')) | (Some('`'), Some('`')) | (Some('['), Some(']'))
            if trimmed.len() >= 2 =>
        {
            &trimmed[1..trimmed.len() - 1]
        }
        _ => trimmed,
    }
}

pub fn is_primary_key_option(option: &ColumnOption) -> bool {
    matches!(option, ColumnOption::Unique { is_primary, .. } if *is_primary)
}

/// Name the engine gives a primary key: always `PRIMARY` on MySQL,
/// otherwise the declared constraint name or `<table>_pkey`.
pub fn primary_key_name(dialect: Dialect, table: &str, declared: Option<String>) -> String {
    match dialect {
        Dialect::Mysql => "PRIMARY".to_string(),
        _ => declared.unwrap_or_else(|| format!("{table}_pkey")),
    }
}

/// Columns of a primary key constraint, folded for the dialect.
pub fn primary_key_columns(constraint: &TableConstraint, dialect: Dialect) -> Option<Vec<String>> {
    match constraint {
        TableConstraint::PrimaryKey { columns, .. } => Some(
            columns
                .iter()
                .map(|column| index_column_name(column, dialect))
                .collect(),
        ),
        _ => None,
    }
}
