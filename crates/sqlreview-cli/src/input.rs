//! Input handling for SQL sources, rule files and schema snapshots.

use anyhow::{Context, Result};
use sqlreview_core::advisor::{merge, parse_overrides, RuleTemplate};
use sqlreview_core::{DatabaseSchema, RuleDescriptor};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// One SQL source and the name it is reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

/// Read SQL input from files or stdin.
///
/// If no files are provided, reads from stdin.
pub fn read_input(files: &[PathBuf]) -> Result<Vec<SourceFile>> {
    if files.is_empty() {
        read_from_stdin().map(|source| vec![source])
    } else {
        read_from_files(files)
    }
}

/// Read a single SQL source, falling back to stdin.
pub fn read_single(file: Option<&Path>) -> Result<SourceFile> {
    match file {
        Some(path) => read_file(path),
        None => read_from_stdin(),
    }
}

fn read_from_stdin() -> Result<SourceFile> {
    let mut content = String::new();
    io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read from stdin")?;

    Ok(SourceFile {
        name: "<stdin>".to_string(),
        content,
    })
}

fn read_from_files(files: &[PathBuf]) -> Result<Vec<SourceFile>> {
    files.iter().map(|path| read_file(path)).collect()
}

fn read_file(path: &Path) -> Result<SourceFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(SourceFile {
        name: path.display().to_string(),
        content,
    })
}

/// Builds the rule list from an optional template and optional overrides.
pub fn load_rules(template: Option<&Path>, overrides: Option<&Path>) -> Result<Vec<RuleDescriptor>> {
    let template = match template {
        Some(path) => {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read rule template: {}", path.display()))?;
            RuleTemplate::from_yaml(&source)
                .with_context(|| format!("Invalid rule template: {}", path.display()))?
        }
        None => RuleTemplate::builtin().context("Built-in rule template is invalid")?,
    };

    let Some(path) = overrides else {
        return Ok(template.rules);
    };
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read overrides: {}", path.display()))?;
    let overrides = parse_overrides(&source)
        .with_context(|| format!("Invalid overrides: {}", path.display()))?;
    Ok(merge(&template, &overrides))
}

/// Loads a schema snapshot, accepting JSON or YAML.
pub fn load_schema(path: &Path) -> Result<DatabaseSchema> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema: {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&source)
            .with_context(|| format!("Invalid schema snapshot: {}", path.display()))
    } else {
        serde_yaml::from_str(&source)
            .with_context(|| format!("Invalid schema snapshot: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlreview_core::{RuleKind, RuleLevel};
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    #[test]
    fn test_read_single_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SELECT * FROM users").unwrap();

        let sources = read_from_files(&[file.path().to_path_buf()]).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].content.contains("SELECT * FROM users"));
    }

    #[test]
    fn test_read_multiple_files() {
        let mut file1 = NamedTempFile::new().unwrap();
        let mut file2 = NamedTempFile::new().unwrap();
        writeln!(file1, "SELECT * FROM users").unwrap();
        writeln!(file2, "SELECT * FROM orders").unwrap();

        let sources =
            read_from_files(&[file1.path().to_path_buf(), file2.path().to_path_buf()]).unwrap();
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_from_files(&[PathBuf::from("/nonexistent/file.sql")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_rules_come_from_builtin_template() {
        let rules = load_rules(None, None).unwrap();
        let require_pk = rules
            .iter()
            .find(|rule| rule.kind == RuleKind::TableRequirePk)
            .unwrap();
        assert_eq!(require_pk.level, RuleLevel::Error);
    }

    #[test]
    fn test_overrides_adjust_levels() {
        let mut overrides = NamedTempFile::new().unwrap();
        writeln!(overrides, "- type: table.require-pk\n  level: DISABLED").unwrap();

        let rules = load_rules(None, Some(overrides.path())).unwrap();
        let require_pk = rules
            .iter()
            .find(|rule| rule.kind == RuleKind::TableRequirePk)
            .unwrap();
        assert_eq!(require_pk.level, RuleLevel::Disabled);
    }

    #[test]
    fn test_bad_template_names_the_file() {
        let mut template = NamedTempFile::new().unwrap();
        writeln!(template, "ruleList:\n  - type: no.such-rule\n    level: ERROR").unwrap();

        let err = load_rules(Some(template.path()), None).unwrap_err();
        assert!(format!("{err:#}").contains("no.such-rule"));
    }

    #[test]
    fn test_schema_json_and_yaml() {
        let mut json = Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, r#"{{"name": "shop", "schemas": [{{"name": "", "tables": []}}]}}"#).unwrap();
        assert_eq!(load_schema(json.path()).unwrap().name, "shop");

        let mut yaml = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(yaml, "name: shop\nschemas:\n  - name: public\n    tables: []").unwrap();
        assert_eq!(load_schema(yaml.path()).unwrap().schemas[0].name, "public");
    }
}
