//! Shipped review rules and their registrations.

use super::registry::RegistryBuilder;
use super::rule::RuleKind;
use crate::types::Dialect;

/// Implements `Rule::base` and `Rule::base_mut` for a struct with a `base` field.
macro_rules! rule_base {
    () => {
        fn base(&self) -> &$crate::advisor::rule::RuleBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut $crate::advisor::rule::RuleBase {
            &mut self.base
        }
    };
}

pub mod column_no_null;
pub mod column_required;
pub mod disallow_commit;
pub mod disallow_limit;
pub mod disallow_order_by;
pub mod index_key_number_limit;
pub mod index_no_duplicate_column;
pub mod index_not_redundant;
pub mod insert_must_specify_column;
pub mod insert_row_limit;
pub mod merge_alter_table;
pub mod naming_table;
pub mod no_foreign_key;
pub mod no_leading_wildcard_like;
pub mod no_select_all;
pub mod prior_backup;
pub mod require_pk;
pub mod require_where;

const ALL: &[Dialect] = &Dialect::ALL;
const MYSQL: &[Dialect] = &[Dialect::Mysql];
const MYSQL_PG: &[Dialect] = &[Dialect::Mysql, Dialect::Postgres];
const MYSQL_PG_ORACLE: &[Dialect] = &[Dialect::Mysql, Dialect::Postgres, Dialect::Oracle];
const ALL_BUT_SNOWFLAKE: &[Dialect] = &[
    Dialect::Mysql,
    Dialect::Postgres,
    Dialect::Oracle,
    Dialect::Mssql,
];
const MYSQL_PG_MSSQL: &[Dialect] = &[Dialect::Mysql, Dialect::Postgres, Dialect::Mssql];

/// Registers every shipped rule for the dialects it supports.
pub fn register_builtin(builder: &mut RegistryBuilder) {
    builder
        .register_all(
            ALL,
            RuleKind::StatementNoSelectAll,
            no_select_all::NoSelectAll::create,
        )
        .register_all(
            ALL,
            RuleKind::StatementRequireWhere,
            require_where::RequireWhere::create,
        )
        .register_all(
            ALL,
            RuleKind::StatementNoLeadingWildcardLike,
            no_leading_wildcard_like::NoLeadingWildcardLike::create,
        )
        .register_all(
            ALL_BUT_SNOWFLAKE,
            RuleKind::StatementDisallowCommit,
            disallow_commit::DisallowCommit::create,
        )
        .register_all(
            MYSQL,
            RuleKind::StatementDisallowLimit,
            disallow_limit::DisallowLimit::create,
        )
        .register_all(
            MYSQL,
            RuleKind::StatementDisallowOrderBy,
            disallow_order_by::DisallowOrderBy::create,
        )
        .register_all(
            MYSQL_PG,
            RuleKind::StatementMergeAlterTable,
            merge_alter_table::MergeAlterTable::create,
        )
        .register_all(
            MYSQL_PG_ORACLE,
            RuleKind::StatementInsertRowLimit,
            insert_row_limit::InsertRowLimit::create,
        )
        .register_all(
            ALL,
            RuleKind::StatementInsertMustSpecifyColumn,
            insert_must_specify_column::InsertMustSpecifyColumn::create,
        )
        .register_all(
            ALL_BUT_SNOWFLAKE,
            RuleKind::StatementPriorBackupCheck,
            prior_backup::PriorBackupCheck::create,
        )
        .register_all(ALL, RuleKind::NamingTable, naming_table::NamingTable::create)
        .register_all(ALL, RuleKind::TableRequirePk, require_pk::RequirePk::create)
        .register_all(
            ALL,
            RuleKind::TableNoForeignKey,
            no_foreign_key::NoForeignKey::create,
        )
        .register_all(
            ALL,
            RuleKind::ColumnRequired,
            column_required::ColumnRequired::create,
        )
        .register_all(
            ALL_BUT_SNOWFLAKE,
            RuleKind::ColumnNoNull,
            column_no_null::ColumnNoNull::create,
        )
        .register_all(
            MYSQL_PG_ORACLE,
            RuleKind::IndexKeyNumberLimit,
            index_key_number_limit::IndexKeyNumberLimit::create,
        )
        .register_all(
            MYSQL_PG,
            RuleKind::IndexNoDuplicateColumn,
            index_no_duplicate_column::IndexNoDuplicateColumn::create,
        )
        .register_all(
            MYSQL_PG_MSSQL,
            RuleKind::IndexNotRedundant,
            index_not_redundant::IndexNotRedundant::create,
        );
}
