//! CLI argument parsing using clap.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use sqlreview_core::{ChangeType, Dialect};
use std::path::PathBuf;

/// sqlreview - multi-dialect SQL review
#[derive(Parser, Debug)]
#[command(name = "sqlreview")]
#[command(about = "Review SQL changes against a rule list", long_about = None)]
#[command(version)]
pub struct Args {
    /// Raise log verbosity on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run review rules over SQL files or stdin
    Check(CheckArgs),
    /// Print a statement capped to a maximum row count
    Limit(LimitArgs),
}

#[derive(ClapArgs, Debug)]
pub struct CheckArgs {
    /// SQL files to review (reads from stdin if none provided)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// SQL dialect
    #[arg(short, long, default_value = "mysql", value_enum)]
    pub dialect: DialectArg,

    /// Rule template (YAML); defaults to the built-in template
    #[arg(short, long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Per-rule level and payload overrides (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub overrides: Option<PathBuf>,

    /// Schema snapshot (JSON or YAML) enabling schema-aware checks
    #[arg(short, long, value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// Database the batch runs against
    #[arg(long, value_name = "NAME")]
    pub database: Option<String>,

    /// Schema unqualified names resolve to
    #[arg(long = "current-schema", value_name = "NAME")]
    pub current_schema: Option<String>,

    /// Kind of change being reviewed
    #[arg(long, default_value = "ddl", value_enum)]
    pub change_type: ChangeTypeArg,

    /// Output format
    #[arg(short, long, default_value = "text", value_enum)]
    pub format: OutputFormat,

    /// Compact JSON output (no pretty-printing)
    #[arg(short, long)]
    pub compact: bool,
}

#[derive(ClapArgs, Debug)]
pub struct LimitArgs {
    /// SQL file holding one query (reads from stdin if omitted)
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// SQL dialect
    #[arg(short, long, default_value = "oracle", value_enum)]
    pub dialect: DialectArg,

    /// Maximum number of rows to return
    #[arg(short = 'n', long, default_value = "1000")]
    pub max_rows: u64,

    /// Server version banner, e.g. "19.0.0.0.0"
    #[arg(long, value_name = "VERSION")]
    pub db_version: Option<String>,
}

/// SQL dialect options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialectArg {
    Mysql,
    Postgres,
    Oracle,
    Mssql,
    Snowflake,
}

impl From<DialectArg> for Dialect {
    fn from(d: DialectArg) -> Self {
        match d {
            DialectArg::Mysql => Dialect::Mysql,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Oracle => Dialect::Oracle,
            DialectArg::Mssql => Dialect::Mssql,
            DialectArg::Snowflake => Dialect::Snowflake,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChangeTypeArg {
    Ddl,
    Dml,
    Sdl,
    DdlGhost,
}

impl From<ChangeTypeArg> for ChangeType {
    fn from(c: ChangeTypeArg) -> Self {
        match c {
            ChangeTypeArg::Ddl => ChangeType::Ddl,
            ChangeTypeArg::Dml => ChangeType::Dml,
            ChangeTypeArg::Sdl => ChangeType::Sdl,
            ChangeTypeArg::DdlGhost => ChangeType::DdlGhost,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per advice
    Text,
    /// JSON advice list
    Json,
    /// Bordered table
    Table,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_conversion() {
        let dialect: Dialect = DialectArg::Postgres.into();
        assert_eq!(dialect, Dialect::Postgres);
        let dialect: Dialect = DialectArg::Mssql.into();
        assert_eq!(dialect, Dialect::Mssql);
    }

    #[test]
    fn test_parse_minimal_check() {
        let args = Args::parse_from(["sqlreview", "check", "test.sql"]);
        let Command::Check(check) = args.command else {
            panic!("expected check");
        };
        assert_eq!(check.files.len(), 1);
        assert_eq!(check.dialect, DialectArg::Mysql);
        assert_eq!(check.format, OutputFormat::Text);
        assert_eq!(check.change_type, ChangeTypeArg::Ddl);
        assert!(check.rules.is_none());
    }

    #[test]
    fn test_parse_full_check() {
        let args = Args::parse_from([
            "sqlreview",
            "-vv",
            "check",
            "-d",
            "postgres",
            "--rules",
            "rules.yaml",
            "--overrides",
            "overrides.json",
            "--schema",
            "schema.json",
            "--database",
            "shop",
            "--current-schema",
            "sales",
            "--change-type",
            "dml",
            "-f",
            "json",
            "--compact",
            "a.sql",
            "b.sql",
        ]);
        assert_eq!(args.verbose, 2);
        let Command::Check(check) = args.command else {
            panic!("expected check");
        };
        assert_eq!(check.dialect, DialectArg::Postgres);
        assert_eq!(check.rules, Some(PathBuf::from("rules.yaml")));
        assert_eq!(check.overrides, Some(PathBuf::from("overrides.json")));
        assert_eq!(check.database.as_deref(), Some("shop"));
        assert_eq!(check.current_schema.as_deref(), Some("sales"));
        assert_eq!(check.change_type, ChangeTypeArg::Dml);
        assert_eq!(check.format, OutputFormat::Json);
        assert!(check.compact);
        assert_eq!(check.files.len(), 2);
    }

    #[test]
    fn test_parse_limit() {
        let args = Args::parse_from([
            "sqlreview",
            "limit",
            "--max-rows",
            "50",
            "--db-version",
            "19.0",
        ]);
        let Command::Limit(limit) = args.command else {
            panic!("expected limit");
        };
        assert_eq!(limit.dialect, DialectArg::Oracle);
        assert_eq!(limit.max_rows, 50);
        assert_eq!(limit.db_version.as_deref(), Some("19.0"));
        assert!(limit.file.is_none());
    }

    #[test]
    fn test_unknown_dialect_is_rejected() {
        assert!(Args::try_parse_from(["sqlreview", "check", "-d", "hive"]).is_err());
    }
}
