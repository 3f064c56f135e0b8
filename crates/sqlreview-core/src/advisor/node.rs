//! Tagged union over the grammar productions the dispatcher reports.

use crate::error::Position;
use sqlparser::ast::{
    AlterTableOperation, ColumnDef, ColumnOptionDef, CreateIndex, CreateTable, Delete, Expr,
    Insert, ObjectName, ObjectType, OrderByExpr, Query, Select, SelectItem, SetExpr, SetOperator,
    Spanned, Statement, TableConstraint, TableFactor, TableWithJoins, UpdateTableFromKind,
};

/// Discriminant of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Statement,
    Query,
    Select,
    SetOperation,
    SelectItem,
    TableFactor,
    Expr,
    OrderByExpr,
    CreateTable,
    ColumnDef,
    ColumnOption,
    TableConstraint,
    AlterTable,
    AlterTableOperation,
    CreateIndex,
    Drop,
    Insert,
    Update,
    Delete,
    Commit,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Statement => "Statement",
            Self::Query => "Query",
            Self::Select => "Select",
            Self::SetOperation => "SetOperation",
            Self::SelectItem => "SelectItem",
            Self::TableFactor => "TableFactor",
            Self::Expr => "Expr",
            Self::OrderByExpr => "OrderByExpr",
            Self::CreateTable => "CreateTable",
            Self::ColumnDef => "ColumnDef",
            Self::ColumnOption => "ColumnOption",
            Self::TableConstraint => "TableConstraint",
            Self::AlterTable => "AlterTable",
            Self::AlterTableOperation => "AlterTableOperation",
            Self::CreateIndex => "CreateIndex",
            Self::Drop => "Drop",
            Self::Insert => "Insert",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Commit => "Commit",
        }
    }
}

/// Fields of an `UPDATE` statement, borrowed from the statement variant.
#[derive(Debug, Clone, Copy)]
pub struct UpdateNode<'a> {
    pub table: &'a TableWithJoins,
    pub from: Option<&'a UpdateTableFromKind>,
    pub selection: Option<&'a Expr>,
    pub limit: Option<&'a Expr>,
}

/// A borrowed view of one parse-tree node.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Statement(&'a Statement),
    Query(&'a Query),
    Select(&'a Select),
    SetOperation {
        op: &'a SetOperator,
        left: &'a SetExpr,
        right: &'a SetExpr,
    },
    SelectItem(&'a SelectItem),
    TableFactor(&'a TableFactor),
    Expr(&'a Expr),
    OrderByExpr(&'a OrderByExpr),
    CreateTable(&'a CreateTable),
    ColumnDef(&'a ColumnDef),
    ColumnOption(&'a ColumnOptionDef),
    TableConstraint(&'a TableConstraint),
    AlterTable {
        name: &'a ObjectName,
        operations: &'a [AlterTableOperation],
    },
    AlterTableOperation(&'a AlterTableOperation),
    CreateIndex(&'a CreateIndex),
    Drop {
        object_type: &'a ObjectType,
        names: &'a [ObjectName],
        if_exists: bool,
    },
    Insert(&'a Insert),
    Update(UpdateNode<'a>),
    Delete(&'a Delete),
    Commit,
}

impl<'a> Node<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Statement(_) => NodeKind::Statement,
            Self::Query(_) => NodeKind::Query,
            Self::Select(_) => NodeKind::Select,
            Self::SetOperation { .. } => NodeKind::SetOperation,
            Self::SelectItem(_) => NodeKind::SelectItem,
            Self::TableFactor(_) => NodeKind::TableFactor,
            Self::Expr(_) => NodeKind::Expr,
            Self::OrderByExpr(_) => NodeKind::OrderByExpr,
            Self::CreateTable(_) => NodeKind::CreateTable,
            Self::ColumnDef(_) => NodeKind::ColumnDef,
            Self::ColumnOption(_) => NodeKind::ColumnOption,
            Self::TableConstraint(_) => NodeKind::TableConstraint,
            Self::AlterTable { .. } => NodeKind::AlterTable,
            Self::AlterTableOperation(_) => NodeKind::AlterTableOperation,
            Self::CreateIndex(_) => NodeKind::CreateIndex,
            Self::Drop { .. } => NodeKind::Drop,
            Self::Insert(_) => NodeKind::Insert,
            Self::Update(_) => NodeKind::Update,
            Self::Delete(_) => NodeKind::Delete,
            Self::Commit => NodeKind::Commit,
        }
    }

    /// Start position relative to the statement text.
    ///
    /// Statement-level productions report the statement start so that
    /// advice lands on the leading keyword (`CREATE`, `ALTER`, ...). Nested
    /// nodes use the grammar's span and return `None` when it is empty.
    pub fn position(&self) -> Option<Position> {
        let span = match self {
            Self::Statement(_)
            | Self::CreateTable(_)
            | Self::AlterTable { .. }
            | Self::CreateIndex(_)
            | Self::Drop { .. }
            | Self::Insert(_)
            | Self::Update(_)
            | Self::Delete(_)
            | Self::Commit => return Some(Position::new(1, 1)),
            Self::Query(query) => query.span(),
            Self::Select(select) => select.span(),
            Self::SetOperation { left, .. } => left.span(),
            Self::SelectItem(item) => item.span(),
            Self::TableFactor(factor) => factor.span(),
            Self::Expr(expr) => expr.span(),
            Self::OrderByExpr(order_by) => order_by.span(),
            Self::ColumnDef(column) => column.span(),
            Self::ColumnOption(option) => option.span(),
            Self::TableConstraint(constraint) => constraint.span(),
            Self::AlterTableOperation(operation) => operation.span(),
        };

        if span.start.line == 0 {
            return None;
        }
        Some(Position::new(
            span.start.line as usize,
            span.start.column as usize,
        ))
    }
}
