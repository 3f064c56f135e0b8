//! statement.merge-alter-table: several statements reshaping one table should
//! be merged into a single ALTER TABLE.
//!
//! Findings are deferred to the end of the batch because the count is only
//! known once every statement has been seen.

use crate::advisor::helpers::TableKey;
use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase, StatementOrigin};
use crate::error::{ConfigError, RuleError};
use crate::types::{advice_codes, Dialect};
use sqlparser::ast::ObjectName;

struct TableChanges {
    key: TableKey,
    display: String,
    count: usize,
    last: StatementOrigin,
}

pub struct MergeAlterTable {
    base: RuleBase,
    dialect: Dialect,
    current_database: Option<String>,
    tables: Vec<TableChanges>,
}

impl MergeAlterTable {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        Ok(Box::new(Self {
            base: ctx.rule_base(),
            dialect: ctx.dialect,
            current_database: ctx.current_database.map(str::to_string),
            tables: Vec::new(),
        }))
    }

    fn record(&mut self, name: &ObjectName) {
        let Some(key) = TableKey::resolve(
            name,
            self.dialect,
            self.current_database.as_deref(),
            None,
        ) else {
            return;
        };
        let origin = self.base.origin();
        match self.tables.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => {
                entry.count += 1;
                entry.last = origin;
            }
            None => self.tables.push(TableChanges {
                display: key.table.clone(),
                key,
                count: 1,
                last: origin,
            }),
        }
    }
}

impl Rule for MergeAlterTable {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        matches!(kind, NodeKind::CreateTable | NodeKind::AlterTable)
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        match node {
            Node::CreateTable(create) => self.record(&create.name),
            Node::AlterTable { name, .. } => self.record(name),
            _ => {}
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), RuleError> {
        for entry in std::mem::take(&mut self.tables) {
            if entry.count > 1 {
                let content = format!(
                    "There are {} statements to modify table `{}`",
                    entry.count, entry.display
                );
                self.base.report_at(
                    entry.last,
                    advice_codes::STATEMENT_REDUNDANT_ALTER_TABLE,
                    content,
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
    use crate::advisor::rules::testing::run_with;
    use crate::types::Dialect;

    #[test]
    fn reports_once_per_table_at_its_last_statement() {
        let sql = "CREATE TABLE t (id int);\n\
                   ALTER TABLE t ADD COLUMN a int;\n\
                   ALTER TABLE u ADD COLUMN b int;\n\
                   ALTER TABLE T ADD COLUMN c int;";
        let advice = run_with(Dialect::Mysql, RuleKind::StatementMergeAlterTable, sql);
        assert_eq!(advice.len(), 1);
        assert_eq!(advice[0].content, "There are 3 statements to modify table `t`");
        assert_eq!(advice[0].line, Some(4));
    }

    #[test]
    fn single_alter_is_fine() {
        let advice = run_with(
            Dialect::Postgres,
            RuleKind::StatementMergeAlterTable,
            "ALTER TABLE t ADD COLUMN a int",
        );
        assert!(advice.is_empty());
    }
}
