//! Process-wide rule registry keyed by `(dialect, kind)`.
//!
//! The registry is assembled once by [`RegistryBuilder`] and frozen into an
//! immutable [`RuleRegistry`], so lookups need no locking.

use super::rule::{RuleFactory, RuleKind};
use super::rules;
use crate::types::Dialect;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Collects registrations before the registry is frozen.
#[derive(Default)]
pub struct RegistryBuilder {
    factories: HashMap<(Dialect, RuleKind), RuleFactory>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` for `(dialect, kind)`.
    ///
    /// # Panics
    ///
    /// Panics if the pair is already registered. Registration only happens
    /// while building the registry, so a duplicate is a programming error.
    pub fn register(&mut self, dialect: Dialect, kind: RuleKind, factory: RuleFactory) -> &mut Self {
        if self.factories.insert((dialect, kind), factory).is_some() {
            panic!("rule {kind} registered twice for dialect {dialect}");
        }
        self
    }

    /// Registers the same factory for several dialects.
    pub fn register_all(
        &mut self,
        dialects: &[Dialect],
        kind: RuleKind,
        factory: RuleFactory,
    ) -> &mut Self {
        for dialect in dialects {
            self.register(*dialect, kind, factory);
        }
        self
    }

    pub fn build(self) -> RuleRegistry {
        RuleRegistry {
            factories: self.factories,
        }
    }
}

/// Immutable `(dialect, kind) -> factory` map.
pub struct RuleRegistry {
    factories: HashMap<(Dialect, RuleKind), RuleFactory>,
}

impl RuleRegistry {
    /// A registry holding every shipped rule.
    pub fn builtin() -> Self {
        let mut builder = RegistryBuilder::new();
        rules::register_builtin(&mut builder);
        builder.build()
    }

    pub fn lookup(&self, dialect: Dialect, kind: RuleKind) -> Option<RuleFactory> {
        self.factories.get(&(dialect, kind)).copied()
    }

    pub fn contains(&self, dialect: Dialect, kind: RuleKind) -> bool {
        self.factories.contains_key(&(dialect, kind))
    }

    /// Rule kinds registered for `dialect`, sorted.
    pub fn kinds_for(&self, dialect: Dialect) -> Vec<RuleKind> {
        let mut kinds: Vec<RuleKind> = self
            .factories
            .keys()
            .filter(|(registered, _)| *registered == dialect)
            .map(|(_, kind)| *kind)
            .collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// The shared built-in registry, built on first use.
pub fn global_registry() -> &'static RuleRegistry {
    static REGISTRY: OnceLock<RuleRegistry> = OnceLock::new();
    REGISTRY.get_or_init(RuleRegistry::builtin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::rule::CheckContext;
    use crate::advisor::rule::Rule;
    use crate::error::ConfigError;

    fn never(_: &CheckContext<'_>) -> Result<Box<dyn Rule>, ConfigError> {
        Err(ConfigError::UnknownRuleKind("never".to_string()))
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_registration_panics() {
        let mut builder = RegistryBuilder::new();
        builder.register(Dialect::Mysql, RuleKind::TableRequirePk, never);
        builder.register(Dialect::Mysql, RuleKind::TableRequirePk, never);
    }

    #[test]
    fn same_kind_for_different_dialects_is_allowed() {
        let mut builder = RegistryBuilder::new();
        builder.register_all(
            &[Dialect::Mysql, Dialect::Postgres],
            RuleKind::TableRequirePk,
            never,
        );
        let registry = builder.build();
        assert_eq!(registry.len(), 2);
        assert!(registry.lookup(Dialect::Oracle, RuleKind::TableRequirePk).is_none());
    }

    #[test]
    fn builtin_registry_scopes_mysql_only_rules() {
        let registry = global_registry();
        assert!(registry.contains(Dialect::Mysql, RuleKind::StatementDisallowLimit));
        assert!(!registry.contains(Dialect::Postgres, RuleKind::StatementDisallowLimit));
        assert!(registry.contains(Dialect::Snowflake, RuleKind::TableRequirePk));
        assert!(registry
            .kinds_for(Dialect::Mssql)
            .contains(&RuleKind::IndexNotRedundant));
    }
}
