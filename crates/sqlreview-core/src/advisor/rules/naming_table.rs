//! naming.table: table names follow a configured pattern and length.

use crate::advisor::node::{Node, NodeKind};
use crate::advisor::rule::{CheckContext, Rule, RuleBase};
use crate::error::{ConfigError, RuleError};
use crate::types::advice_codes;
use regex::Regex;
use serde::Deserialize;
use sqlparser::ast::ObjectName;

const DEFAULT_FORMAT: &str = "^[a-z]+(_[a-z]+)*$";
const DEFAULT_MAX_LENGTH: usize = 63;

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Payload {
    format: String,
    max_length: usize,
}

impl Default for Payload {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

pub struct NamingTable {
    base: RuleBase,
    format: Regex,
    max_length: usize,
}

impl NamingTable {
    pub fn create(ctx: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        let payload: Payload = ctx.payload()?;
        let format = Regex::new(&payload.format).map_err(|err| ConfigError::InvalidPayload {
            rule: ctx.descriptor.kind.to_string(),
            message: format!("invalid format: {err}"),
        })?;
        Ok(Box::new(Self {
            base: ctx.rule_base(),
            format,
            max_length: payload.max_length,
        }))
    }

    fn check(&mut self, name: &ObjectName, node: Node<'_>) {
        let Some(table) = name.0.last().and_then(|part| part.as_ident()) else {
            return;
        };
        let table = table.value.as_str();
        if !self.format.is_match(table) {
            let content = format!(
                "`{table}` mismatches table naming convention, naming format should be \"{}\"",
                self.format.as_str()
            );
            self.base.report(
                advice_codes::NAMING_TABLE_CONVENTION_MISMATCH,
                content,
                node.position(),
            );
        }
        // Zero means no length limit.
        if self.max_length > 0 && table.chars().count() > self.max_length {
            let content = format!(
                "`{table}` mismatches table naming convention, its length should be within {} characters",
                self.max_length
            );
            self.base.report(
                advice_codes::NAMING_TABLE_CONVENTION_MISMATCH,
                content,
                node.position(),
            );
        }
    }
}

impl Rule for NamingTable {
    rule_base!();

    fn interested_in(&self, kind: NodeKind) -> bool {
        kind == NodeKind::CreateTable
    }

    fn on_enter(&mut self, node: Node<'_>, _kind: NodeKind) -> Result<(), RuleError> {
        if let Node::CreateTable(create) = node {
            self.check(&create.name, node);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::advisor::config::RuleDescriptor;
    use crate::advisor::rule::{CheckContext, RuleKind, RuleLevel};
    use crate::advisor::rules::testing::{run, Harness};
    use crate::error::ConfigError;
    use crate::types::{ChangeType, Dialect};
    use serde_json::json;

    #[test]
    fn snake_case_passes() {
        assert!(run(RuleKind::NamingTable, "CREATE TABLE order_items (id int)").is_empty());
    }

    #[test]
    fn camel_case_fails() {
        let advice = run(RuleKind::NamingTable, "CREATE TABLE \"OrderItems\" (id int)");
        assert_eq!(advice.len(), 1);
        assert!(advice[0].content.starts_with("`OrderItems` mismatches"));
    }

    #[test]
    fn length_limit_comes_from_payload() {
        let advice = Harness {
            payload: json!({ "maxLength": 4 }),
            ..Harness::default()
        }
        .run(RuleKind::NamingTable, "CREATE TABLE orders (id int)");
        assert_eq!(advice.len(), 1);
        assert!(advice[0].content.ends_with("within 4 characters"));
    }

    #[test]
    fn invalid_regex_is_a_config_error() {
        let descriptor = RuleDescriptor::new(RuleKind::NamingTable, RuleLevel::Warning)
            .with_payload(json!({ "format": "([a-z" }));
        let context = CheckContext {
            dialect: Dialect::Mysql,
            descriptor: &descriptor,
            statements: &[],
            current_database: None,
            current_schema: None,
            schema: None,
            final_schema: None,
            change_type: ChangeType::Ddl,
        };
        assert!(matches!(
            super::NamingTable::create(&context),
            Err(ConfigError::InvalidPayload { .. })
        ));
    }
}
