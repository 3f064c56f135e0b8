//! Schema walk-through.
//!
//! Replays the batch's DDL against a copy of the schema snapshot and stops at
//! the first statement the snapshot cannot absorb: creating a table that
//! exists, dropping a column that does not, and so on. Only MySQL and
//! Postgres snapshots are replayed.

use super::helpers::{
    index_column_name, object_base_name, object_schema_name, primary_key_name, unquote, TableKey,
};
use crate::error::WalkThroughError;
use crate::parser::ParsedStatement;
use crate::types::{
    advice_codes, ColumnMetadata, DatabaseSchema, Dialect, IndexMetadata, SchemaMetadata,
    TableMetadata,
};
use sqlparser::ast::{
    AlterTableOperation, ColumnDef, ColumnOption, CreateIndex, CreateTable, Ident, IndexColumn,
    ObjectName, ObjectType, Statement, TableConstraint,
};
#[cfg(feature = "tracing")]
use tracing::debug;

/// True for dialects whose DDL the walk-through understands.
pub fn supports(dialect: Dialect) -> bool {
    matches!(dialect, Dialect::Mysql | Dialect::Postgres)
}

/// Replays `statements` over `snapshot` and returns the resulting schema.
pub fn walk_through(
    snapshot: &DatabaseSchema,
    dialect: Dialect,
    current_schema: Option<&str>,
    statements: &[ParsedStatement],
) -> Result<DatabaseSchema, WalkThroughError> {
    let mut walk = WalkThrough {
        database: snapshot.clone(),
        current_schema: current_schema.map(str::to_string),
        step: Step { dialect, line: 1 },
    };
    if dialect == Dialect::Mysql && walk.database.schemas.is_empty() {
        walk.database.schemas.push(SchemaMetadata::default());
    }

    for statement in statements {
        walk.step.line = statement.start_position().line;
        if let Err(err) = walk.statement(&statement.statement) {
            #[cfg(feature = "tracing")]
            debug!(code = err.code, line = err.line, "walk-through stopped: {}", err.message);
            return Err(err);
        }
    }
    Ok(walk.database)
}

/// Dialect and line of the statement being replayed.
#[derive(Clone, Copy)]
struct Step {
    dialect: Dialect,
    line: usize,
}

impl Step {
    fn fail(&self, code: i32, message: impl Into<String>) -> WalkThroughError {
        WalkThroughError::new(code, message, self.line)
    }

    fn column_name(&self, ident: &Ident) -> String {
        self.dialect.normalize_identifier(ident)
    }
}

struct Target {
    schema: Option<String>,
    table: String,
}

struct WalkThrough {
    database: DatabaseSchema,
    current_schema: Option<String>,
    step: Step,
}

impl WalkThrough {
    fn statement(&mut self, statement: &Statement) -> Result<(), WalkThroughError> {
        match statement {
            Statement::CreateTable(create) => self.create_table(create),
            Statement::AlterTable {
                name, operations, ..
            } => self.alter_table(name, operations),
            Statement::CreateIndex(index) => self.create_index(index),
            Statement::Drop {
                object_type: ObjectType::Table,
                names,
                if_exists,
                ..
            } => names
                .iter()
                .try_for_each(|name| self.drop_table(name, *if_exists)),
            Statement::Drop {
                object_type: ObjectType::Index,
                names,
                if_exists,
                ..
            } => names
                .iter()
                .try_for_each(|name| self.drop_index(name, *if_exists)),
            _ => Ok(()),
        }
    }

    fn current_database(&self) -> Option<&str> {
        Some(self.database.name.as_str()).filter(|name| !name.is_empty())
    }

    fn target(&self, name: &ObjectName) -> Result<Target, WalkThroughError> {
        let key = TableKey::resolve(
            name,
            self.step.dialect,
            self.current_database(),
            self.current_schema.as_deref(),
        )
        .ok_or_else(|| self.step.fail(advice_codes::INTERNAL, format!("Invalid name `{name}`")))?;
        if key.is_other_database(self.step.dialect, self.current_database()) {
            return Err(self.step.fail(
                advice_codes::NOT_CURRENT_DATABASE,
                format!(
                    "Database `{}` is not the current database `{}`",
                    key.database.unwrap_or_default(),
                    self.database.name
                ),
            ));
        }
        Ok(Target {
            schema: key.schema,
            table: key.table,
        })
    }

    fn schema_mut(&mut self, schema: Option<&str>) -> Result<&mut SchemaMetadata, WalkThroughError> {
        let step = self.step;
        self.database
            .schema_mut(step.dialect, schema)
            .ok_or_else(|| {
                step.fail(
                    advice_codes::SCHEMA_NOT_EXISTS,
                    format!("Schema `{}` does not exist", schema.unwrap_or_default()),
                )
            })
    }

    fn table_mut(&mut self, target: &Target) -> Result<&mut TableMetadata, WalkThroughError> {
        let step = self.step;
        self.schema_mut(target.schema.as_deref())?
            .table_mut(step.dialect, &target.table)
            .ok_or_else(|| {
                step.fail(
                    advice_codes::TABLE_NOT_EXISTS,
                    format!("Table `{}` does not exist", target.table),
                )
            })
    }

    fn create_table(&mut self, create: &CreateTable) -> Result<(), WalkThroughError> {
        let target = self.target(&create.name)?;
        let step = self.step;
        let schema = self.schema_mut(target.schema.as_deref())?;
        if schema.table(step.dialect, &target.table).is_some() {
            if create.if_not_exists {
                return Ok(());
            }
            return Err(step.fail(
                advice_codes::TABLE_EXISTS,
                format!("Table `{}` already exists", target.table),
            ));
        }

        let mut table = TableMetadata {
            name: target.table,
            ..TableMetadata::default()
        };
        for column in &create.columns {
            add_column(step, &mut table, column)?;
        }
        for constraint in &create.constraints {
            add_constraint(step, &mut table, constraint)?;
        }
        schema.tables.push(table);
        Ok(())
    }

    fn drop_table(&mut self, name: &ObjectName, if_exists: bool) -> Result<(), WalkThroughError> {
        let target = self.target(name)?;
        let step = self.step;
        let schema = self.schema_mut(target.schema.as_deref())?;
        let before = schema.tables.len();
        schema
            .tables
            .retain(|table| !step.dialect.names_match(&table.name, &target.table));
        if schema.tables.len() == before && !if_exists {
            return Err(step.fail(
                advice_codes::TABLE_NOT_EXISTS,
                format!("Table `{}` does not exist", target.table),
            ));
        }
        Ok(())
    }

    fn alter_table(
        &mut self,
        name: &ObjectName,
        operations: &[AlterTableOperation],
    ) -> Result<(), WalkThroughError> {
        let target = self.target(name)?;
        let step = self.step;
        let table = self.table_mut(&target)?;
        for operation in operations {
            match operation {
                AlterTableOperation::AddColumn {
                    column_def,
                    if_not_exists,
                    ..
                } => {
                    let column = step.column_name(&column_def.name);
                    if *if_not_exists && table.column(step.dialect, &column).is_some() {
                        continue;
                    }
                    add_column(step, table, column_def)?;
                }
                AlterTableOperation::DropColumn {
                    column_names,
                    if_exists,
                    ..
                } => {
                    for column in column_names {
                        drop_column(step, table, &step.column_name(column), *if_exists)?;
                    }
                }
                AlterTableOperation::RenameColumn {
                    old_column_name,
                    new_column_name,
                } => rename_column(
                    step,
                    table,
                    &step.column_name(old_column_name),
                    &step.column_name(new_column_name),
                )?,
                AlterTableOperation::AddConstraint { constraint, .. } => {
                    add_constraint(step, table, constraint)?
                }
                AlterTableOperation::DropPrimaryKey { .. } => {
                    if table.primary_key().is_none() {
                        return Err(step.fail(
                            advice_codes::PRIMARY_KEY_NOT_EXISTS,
                            format!("Primary key does not exist in table `{}`", table.name),
                        ));
                    }
                    table.indexes.retain(|index| !index.primary);
                }
                AlterTableOperation::DropConstraint { name, .. } => {
                    // Foreign keys and checks are not tracked, so a miss is not an error.
                    let constraint = step.column_name(name);
                    table
                        .indexes
                        .retain(|index| !step.dialect.names_match(&index.name, &constraint));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn create_index(&mut self, index: &CreateIndex) -> Result<(), WalkThroughError> {
        let target = self.target(&index.table_name)?;
        let step = self.step;
        let name = index
            .name
            .as_ref()
            .and_then(|name| object_base_name(name, step.dialect));

        // Postgres index names live in the schema namespace, MySQL ones in the table.
        if step.dialect == Dialect::Postgres {
            if let Some(name) = &name {
                let schema = self.schema_mut(target.schema.as_deref())?;
                if let Some((table, _)) = schema.index(step.dialect, name) {
                    if index.if_not_exists {
                        return Ok(());
                    }
                    return Err(step.fail(
                        advice_codes::INDEX_EXISTS,
                        format!("Index `{name}` already exists in table `{}`", table.name),
                    ));
                }
            }
        }

        let table = self.table_mut(&target)?;
        if index.if_not_exists {
            if let Some(name) = &name {
                if table.index(step.dialect, name).is_some() {
                    return Ok(());
                }
            }
        }
        let columns = index
            .columns
            .iter()
            .map(|column| index_column_name(column, step.dialect))
            .collect();
        add_index(step, table, name, columns, index.unique)
    }

    fn drop_index(&mut self, name: &ObjectName, if_exists: bool) -> Result<(), WalkThroughError> {
        let step = self.step;
        let Some(index_name) = object_base_name(name, step.dialect) else {
            return Ok(());
        };
        let schema_name = object_schema_name(name, step.dialect).or_else(|| self.current_schema.clone());
        let schema = self.schema_mut(schema_name.as_deref())?;
        let owner = schema
            .tables
            .iter_mut()
            .find(|table| table.index(step.dialect, &index_name).is_some());
        match owner {
            Some(table) => {
                table
                    .indexes
                    .retain(|index| !step.dialect.names_match(&index.name, &index_name));
                Ok(())
            }
            None if if_exists => Ok(()),
            None => Err(step.fail(
                advice_codes::INDEX_NOT_EXISTS,
                format!("Index `{index_name}` does not exist"),
            )),
        }
    }
}

fn add_column(step: Step, table: &mut TableMetadata, column: &ColumnDef) -> Result<(), WalkThroughError> {
    let name = step.column_name(&column.name);
    if table.column(step.dialect, &name).is_some() {
        return Err(step.fail(
            advice_codes::COLUMN_EXISTS,
            format!("Column `{name}` already exists in table `{}`", table.name),
        ));
    }

    let mut nullable = true;
    let mut primary = false;
    let mut unique = false;
    for option in &column.options {
        match &option.option {
            ColumnOption::NotNull => nullable = false,
            ColumnOption::Unique { is_primary, .. } if *is_primary => primary = true,
            ColumnOption::Unique { .. } => unique = true,
            _ => {}
        }
    }

    table.columns.push(ColumnMetadata {
        name: name.clone(),
        data_type: Some(column.data_type.to_string()),
        nullable: nullable && !primary,
    });
    if primary {
        add_primary_key(step, table, None, vec![name.clone()])?;
    }
    if unique {
        add_index(step, table, None, vec![name], true)?;
    }
    Ok(())
}

fn add_constraint(
    step: Step,
    table: &mut TableMetadata,
    constraint: &TableConstraint,
) -> Result<(), WalkThroughError> {
    let constraint_name = |name: &Option<Ident>| name.as_ref().map(|ident| step.column_name(ident));

    match constraint {
        TableConstraint::PrimaryKey { name, columns, .. } => {
            add_primary_key(step, table, constraint_name(name), key_columns(step, columns))
        }
        TableConstraint::Unique { name, columns, .. } => {
            add_index(step, table, constraint_name(name), key_columns(step, columns), true)
        }
        TableConstraint::Index { name, columns, .. } => {
            let columns = columns
                .iter()
                .map(|column| step.dialect.fold_unquoted(unquote(&column.to_string())))
                .collect();
            add_index(step, table, constraint_name(name), columns, false)
        }
        _ => Ok(()),
    }
}

fn key_columns(step: Step, columns: &[IndexColumn]) -> Vec<String> {
    columns
        .iter()
        .map(|column| index_column_name(column, step.dialect))
        .collect()
}

fn check_key_columns(step: Step, table: &TableMetadata, columns: &[String]) -> Result<(), WalkThroughError> {
    for column in columns {
        // Expression keys are not resolved against the column list.
        let is_plain = !column.contains(['(', ' ']);
        if is_plain && table.column(step.dialect, column).is_none() {
            return Err(step.fail(
                advice_codes::COLUMN_NOT_EXISTS,
                format!("Column `{column}` does not exist in table `{}`", table.name),
            ));
        }
    }
    Ok(())
}

fn add_primary_key(
    step: Step,
    table: &mut TableMetadata,
    name: Option<String>,
    columns: Vec<String>,
) -> Result<(), WalkThroughError> {
    if table.primary_key().is_some() {
        return Err(step.fail(
            advice_codes::PRIMARY_KEY_EXISTS,
            format!("Primary key exists in table `{}`", table.name),
        ));
    }
    check_key_columns(step, table, &columns)?;
    for column in &mut table.columns {
        if columns.iter().any(|key| step.dialect.names_match(key, &column.name)) {
            column.nullable = false;
        }
    }
    let name = primary_key_name(step.dialect, &table.name, name);
    table.indexes.push(IndexMetadata {
        name,
        expressions: columns,
        unique: true,
        primary: true,
    });
    Ok(())
}

fn add_index(
    step: Step,
    table: &mut TableMetadata,
    name: Option<String>,
    columns: Vec<String>,
    unique: bool,
) -> Result<(), WalkThroughError> {
    let name = name.unwrap_or_else(|| default_index_name(step.dialect, table, &columns, unique));
    if columns.is_empty() {
        return Err(step.fail(
            advice_codes::INDEX_EMPTY_KEYS,
            format!("Index `{name}` in table `{}` has empty key", table.name),
        ));
    }
    if table.index(step.dialect, &name).is_some() {
        return Err(step.fail(
            advice_codes::INDEX_EXISTS,
            format!("Index `{name}` already exists in table `{}`", table.name),
        ));
    }
    check_key_columns(step, table, &columns)?;
    table.indexes.push(IndexMetadata {
        name,
        expressions: columns,
        unique,
        primary: false,
    });
    Ok(())
}

/// Name the engine picks for an unnamed index.
///
/// MySQL uses the first key column, suffixed `_2`, `_3`, ... on clashes.
fn default_index_name(dialect: Dialect, table: &TableMetadata, columns: &[String], unique: bool) -> String {
    let first = columns.first().cloned().unwrap_or_default();
    match dialect {
        Dialect::Mysql => {
            let mut name = first.clone();
            let mut suffix = 2;
            while table.index(dialect, &name).is_some() {
                name = format!("{first}_{suffix}");
                suffix += 1;
            }
            name
        }
        _ => {
            let kind = if unique { "key" } else { "idx" };
            format!("{}_{}_{kind}", table.name, columns.join("_"))
        }
    }
}

fn drop_column(
    step: Step,
    table: &mut TableMetadata,
    column: &str,
    if_exists: bool,
) -> Result<(), WalkThroughError> {
    if table.column(step.dialect, column).is_none() {
        if if_exists {
            return Ok(());
        }
        return Err(step.fail(
            advice_codes::COLUMN_NOT_EXISTS,
            format!("Column `{column}` does not exist in table `{}`", table.name),
        ));
    }
    // Postgres accepts zero-column tables, MySQL does not.
    if step.dialect == Dialect::Mysql && table.columns.len() == 1 {
        return Err(step.fail(
            advice_codes::DROP_ALL_COLUMNS,
            format!("Can't delete all columns in table `{}`", table.name),
        ));
    }

    table
        .columns
        .retain(|existing| !step.dialect.names_match(&existing.name, column));
    for index in &mut table.indexes {
        index
            .expressions
            .retain(|key| !step.dialect.names_match(key, column));
    }
    table.indexes.retain(|index| !index.expressions.is_empty());
    Ok(())
}

fn rename_column(
    step: Step,
    table: &mut TableMetadata,
    from: &str,
    to: &str,
) -> Result<(), WalkThroughError> {
    if table.column(step.dialect, from).is_none() {
        return Err(step.fail(
            advice_codes::COLUMN_NOT_EXISTS,
            format!("Column `{from}` does not exist in table `{}`", table.name),
        ));
    }
    if !step.dialect.names_match(from, to) && table.column(step.dialect, to).is_some() {
        return Err(step.fail(
            advice_codes::COLUMN_EXISTS,
            format!("Column `{to}` already exists in table `{}`", table.name),
        ));
    }
    for column in &mut table.columns {
        if step.dialect.names_match(&column.name, from) {
            column.name = to.to_string();
        }
    }
    for key in table.indexes.iter_mut().flat_map(|index| index.expressions.iter_mut()) {
        if step.dialect.names_match(key, from) {
            *key = to.to_string();
        }
    }
    Ok(())
}
