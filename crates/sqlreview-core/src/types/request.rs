use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlparser::ast::Ident;
use std::fmt;
use std::str::FromStr;

/// SQL dialect a review or rewrite runs against.
///
/// Dialects differ in grammar, default schema and identifier folding rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Mysql,
    Postgres,
    Oracle,
    Mssql,
    Snowflake,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Self::Mysql,
        Self::Postgres,
        Self::Oracle,
        Self::Mssql,
        Self::Snowflake,
    ];

    pub fn to_sqlparser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        use sqlparser::dialect::{
            GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, SnowflakeDialect,
        };
        match self {
            Self::Mysql => Box::new(MySqlDialect {}),
            Self::Postgres => Box::new(PostgreSqlDialect {}),
            // PL/SQL queries (DUAL, ROWNUM, FETCH FIRST) parse with the generic grammar.
            Self::Oracle => Box::new(GenericDialect {}),
            Self::Mssql => Box::new(MsSqlDialect {}),
            Self::Snowflake => Box::new(SnowflakeDialect {}),
        }
    }

    /// Schema assumed when a statement omits the schema qualifier.
    ///
    /// MySQL has no schema level and Oracle resolves to the session user,
    /// so both return `None`.
    pub fn default_schema(&self) -> Option<&'static str> {
        match self {
            Self::Postgres => Some("public"),
            Self::Mssql => Some("dbo"),
            Self::Snowflake => Some("PUBLIC"),
            Self::Mysql | Self::Oracle => None,
        }
    }

    /// True when the engine compares unquoted identifiers without regard to case.
    pub fn case_insensitive(&self) -> bool {
        matches!(self, Self::Mysql | Self::Mssql)
    }

    /// Folds an identifier the way the engine stores it.
    ///
    /// Quoted identifiers keep their spelling except on engines that compare
    /// all identifiers case-insensitively, where everything folds to lower case.
    pub fn normalize_identifier(&self, ident: &Ident) -> String {
        if self.case_insensitive() {
            return ident.value.to_lowercase();
        }
        if ident.quote_style.is_some() {
            return ident.value.clone();
        }
        self.fold_unquoted(&ident.value)
    }

    /// Folds a bare name (no quoting information available).
    pub fn fold_unquoted(&self, name: &str) -> String {
        match self {
            Self::Postgres | Self::Mysql | Self::Mssql => name.to_lowercase(),
            Self::Oracle | Self::Snowflake => name.to_uppercase(),
        }
    }

    /// Compares two stored names under the engine's rules.
    pub fn names_match(&self, left: &str, right: &str) -> bool {
        if self.case_insensitive() {
            left.eq_ignore_ascii_case(right)
        } else {
            left == right
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
            Self::Oracle => "oracle",
            Self::Mssql => "mssql",
            Self::Snowflake => "snowflake",
        };
        f.write_str(label)
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Self::Mysql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "oracle" | "plsql" => Ok(Self::Oracle),
            "mssql" | "tsql" | "sqlserver" => Ok(Self::Mssql),
            "snowflake" => Ok(Self::Snowflake),
            other => Err(format!("unknown dialect '{other}'")),
        }
    }
}

/// Kind of change a batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    #[default]
    Ddl,
    Dml,
    Sdl,
    DdlGhost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_folds_unquoted_to_lower() {
        let ident = Ident::new("Users");
        assert_eq!(Dialect::Postgres.normalize_identifier(&ident), "users");
        let quoted = Ident::with_quote('"', "Users");
        assert_eq!(Dialect::Postgres.normalize_identifier(&quoted), "Users");
    }

    #[test]
    fn oracle_folds_unquoted_to_upper() {
        let ident = Ident::new("emp");
        assert_eq!(Dialect::Oracle.normalize_identifier(&ident), "EMP");
    }

    #[test]
    fn mssql_ignores_quotes() {
        let quoted = Ident::with_quote('[', "Orders");
        assert_eq!(Dialect::Mssql.normalize_identifier(&quoted), "orders");
        assert_eq!(Dialect::Mssql.default_schema(), Some("dbo"));
    }

    #[test]
    fn dialect_round_trips_through_strings() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.to_string().parse::<Dialect>(), Ok(dialect));
        }
        assert!("db2".parse::<Dialect>().is_err());
    }
}
