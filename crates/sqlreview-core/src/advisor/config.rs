//! Rule templates, caller overrides and the merged rule list.

use super::rule::{RuleKind, RuleLevel};
use crate::error::ConfigError;
use crate::types::Dialect;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
#[cfg(feature = "tracing")]
use tracing::debug;

/// Rule list used when the caller supplies no template.
pub const DEFAULT_TEMPLATE: &str = r#"
ruleList:
  - type: statement.select.no-select-all
    level: WARNING
  - type: statement.where.require
    level: ERROR
  - type: statement.where.no-leading-wildcard-like
    level: WARNING
  - type: statement.disallow-commit
    level: WARNING
  - type: statement.disallow-limit
    level: WARNING
  - type: statement.disallow-order-by
    level: WARNING
  - type: statement.merge-alter-table
    level: WARNING
  - type: statement.insert.row-limit
    level: WARNING
    payload:
      number: 1000
  - type: statement.insert.must-specify-column
    level: WARNING
  - type: naming.table
    level: WARNING
    payload:
      format: "^[a-z]+(_[a-z]+)*$"
      maxLength: 63
  - type: table.require-pk
    level: ERROR
  - type: table.no-foreign-key
    level: WARNING
  - type: column.required
    level: WARNING
    payload:
      list: [id, created_ts, updated_ts, creator_id, updater_id]
  - type: column.no-null
    level: WARNING
  - type: index.key-number-limit
    level: WARNING
    payload:
      number: 5
  - type: index.no-duplicate-column
    level: WARNING
  - type: index.not-redundant
    level: WARNING
"#;

/// A single configured rule: what to run, how loudly, and with which payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleDescriptor {
    #[serde(rename = "type")]
    pub kind: RuleKind,

    pub level: RuleLevel,

    /// Restricts the rule to one dialect; `None` applies it to all.
    #[serde(default, rename = "engine", skip_serializing_if = "Option::is_none")]
    pub dialect: Option<Dialect>,

    #[serde(default, alias = "comment", skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl RuleDescriptor {
    pub fn new(kind: RuleKind, level: RuleLevel) -> Self {
        Self {
            kind,
            level,
            dialect: None,
            description: String::new(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn for_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// True unless the rule is pinned to another dialect.
    pub fn applies_to(&self, dialect: Dialect) -> bool {
        self.dialect.is_none_or(|pinned| pinned == dialect)
    }

    /// Deserialises the payload, using `T::default()` when it is absent.
    pub fn payload_as<T: DeserializeOwned + Default>(&self) -> Result<T, ConfigError> {
        if self.payload.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(self.payload.clone()).map_err(|err| ConfigError::InvalidPayload {
            rule: self.kind.to_string(),
            message: err.to_string(),
        })
    }
}

/// Template entry as written on disk. Levels and kinds are validated after
/// deserialisation so errors name the offending rule.
#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(rename = "type")]
    kind: String,
    level: String,
    #[serde(default)]
    engine: Option<Dialect>,
    #[serde(default, alias = "description")]
    comment: String,
    #[serde(default)]
    payload: Value,
}

impl TryFrom<RawRule> for RuleDescriptor {
    type Error = ConfigError;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        let kind: RuleKind = raw.kind.parse()?;
        let level = RuleLevel::parse_for(kind.as_str(), &raw.level)?;
        Ok(Self {
            kind,
            level,
            dialect: raw.engine,
            description: raw.comment,
            payload: raw.payload,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTemplate {
    #[serde(default)]
    rule_list: Vec<RawRule>,
}

/// An ordered rule list loaded from YAML.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTemplate {
    pub rules: Vec<RuleDescriptor>,
}

impl RuleTemplate {
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        let raw: RawTemplate = serde_yaml::from_str(source)?;
        let rules = raw
            .rule_list
            .into_iter()
            .map(RuleDescriptor::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// The embedded [`DEFAULT_TEMPLATE`].
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(DEFAULT_TEMPLATE)
    }
}

/// Caller-side adjustment to one template rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOverride {
    pub kind: RuleKind,
    pub level: Option<RuleLevel>,
    pub payload: Option<Value>,
}

/// Parses overrides from a YAML or JSON document.
///
/// Accepts either a bare list or `{ ruleList: [...] }`. Only `type`,
/// `level` and `payload` are read; other keys are ignored.
pub fn parse_overrides(source: &str) -> Result<Vec<RuleOverride>, ConfigError> {
    let document: Value = match serde_json::from_str(source) {
        Ok(value) => value,
        Err(_) => serde_yaml::from_str(source)?,
    };

    let entries = match document {
        Value::Null => return Ok(Vec::new()),
        Value::Array(entries) => entries,
        Value::Object(mut object) => match object.remove("ruleList") {
            Some(Value::Array(entries)) => entries,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(ConfigError::InvalidPayload {
                    rule: "ruleList".to_string(),
                    message: format!("expected a list, found {other}"),
                })
            }
        },
        other => {
            return Err(ConfigError::InvalidPayload {
                rule: "overrides".to_string(),
                message: format!("expected a list, found {other}"),
            })
        }
    };

    entries.into_iter().map(parse_override).collect()
}

fn parse_override(entry: Value) -> Result<RuleOverride, ConfigError> {
    let kind_name = entry
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigError::InvalidPayload {
            rule: "overrides".to_string(),
            message: "override entry without a 'type'".to_string(),
        })?;
    let kind: RuleKind = kind_name.parse()?;

    let level = match entry.get("level") {
        None | Some(Value::Null) => None,
        Some(Value::String(level)) => Some(RuleLevel::parse_for(kind.as_str(), level)?),
        Some(other) => {
            return Err(ConfigError::UnknownLevel {
                rule: kind.to_string(),
                level: other.to_string(),
            })
        }
    };

    let payload = entry.get("payload").filter(|value| !value.is_null()).cloned();

    Ok(RuleOverride {
        kind,
        level,
        payload,
    })
}

/// Applies overrides to a template, keeping the template's order.
///
/// Object payloads merge key by key over the template payload; any other
/// payload shape replaces it.
pub fn merge(template: &RuleTemplate, overrides: &[RuleOverride]) -> Vec<RuleDescriptor> {
    let mut rules = template.rules.clone();

    for item in overrides {
        let Some(rule) = rules.iter_mut().find(|rule| rule.kind == item.kind) else {
            #[cfg(feature = "tracing")]
            debug!(rule = %item.kind, "override for rule not in template ignored");
            continue;
        };
        if let Some(level) = item.level {
            rule.level = level;
        }
        if let Some(payload) = &item.payload {
            rule.payload = merge_payload(&rule.payload, payload);
        }
    }

    rules
}

fn merge_payload(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            let mut merged = base.clone();
            for (key, value) in patch {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => patch.clone(),
    }
}
