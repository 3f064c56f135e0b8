//! Read-only schema snapshot consumed by schema-aware rules and the walk-through.

use super::Dialect;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Metadata for a single database, grouped by schema.
///
/// MySQL databases carry exactly one schema with an empty name.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSchema {
    pub name: String,
    #[serde(default)]
    pub schemas: Vec<SchemaMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnMetadata>,
    #[serde(default)]
    pub indexes: Vec<IndexMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub name: String,
    /// Key expressions in index order; plain column names for column indexes.
    #[serde(default)]
    pub expressions: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary: bool,
}

impl DatabaseSchema {
    /// Resolves a schema by name, falling back to the dialect's default schema
    /// and then to the unnamed (or only) schema.
    pub fn schema(&self, dialect: Dialect, name: Option<&str>) -> Option<&SchemaMetadata> {
        match name.or(dialect.default_schema()) {
            Some(target) => self
                .schemas
                .iter()
                .find(|schema| dialect.names_match(&schema.name, target))
                .or_else(|| {
                    // MySQL style snapshots only carry the unnamed schema.
                    if name.is_none() {
                        self.unnamed_schema()
                    } else {
                        None
                    }
                }),
            None => self.unnamed_schema(),
        }
    }

    pub fn schema_mut(
        &mut self,
        dialect: Dialect,
        name: Option<&str>,
    ) -> Option<&mut SchemaMetadata> {
        let index = {
            let found = self.schema(dialect, name)?;
            self.schemas
                .iter()
                .position(|schema| std::ptr::eq(schema, found))?
        };
        self.schemas.get_mut(index)
    }

    fn unnamed_schema(&self) -> Option<&SchemaMetadata> {
        self.schemas
            .iter()
            .find(|schema| schema.name.is_empty())
            .or_else(|| self.schemas.first())
    }

    pub fn table(
        &self,
        dialect: Dialect,
        schema: Option<&str>,
        table: &str,
    ) -> Option<&TableMetadata> {
        self.schema(dialect, schema)?.table(dialect, table)
    }
}

impl SchemaMetadata {
    pub fn table(&self, dialect: Dialect, name: &str) -> Option<&TableMetadata> {
        self.tables
            .iter()
            .find(|table| dialect.names_match(&table.name, name))
    }

    pub fn table_mut(&mut self, dialect: Dialect, name: &str) -> Option<&mut TableMetadata> {
        self.tables
            .iter_mut()
            .find(|table| dialect.names_match(&table.name, name))
    }

    /// Finds an index by name anywhere in the schema, returning its table too.
    pub fn index(&self, dialect: Dialect, name: &str) -> Option<(&TableMetadata, &IndexMetadata)> {
        self.tables.iter().find_map(|table| {
            table
                .index(dialect, name)
                .map(|index| (table, index))
        })
    }
}

impl TableMetadata {
    pub fn column(&self, dialect: Dialect, name: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|column| dialect.names_match(&column.name, name))
    }

    pub fn index(&self, dialect: Dialect, name: &str) -> Option<&IndexMetadata> {
        self.indexes
            .iter()
            .find(|index| dialect.names_match(&index.name, name))
    }

    pub fn primary_key(&self) -> Option<&IndexMetadata> {
        self.indexes.iter().find(|index| index.primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> DatabaseSchema {
        DatabaseSchema {
            name: "shop".to_string(),
            schemas: vec![SchemaMetadata {
                name: "public".to_string(),
                tables: vec![TableMetadata {
                    name: "orders".to_string(),
                    columns: vec![ColumnMetadata {
                        name: "id".to_string(),
                        data_type: Some("int".to_string()),
                        nullable: false,
                    }],
                    indexes: vec![IndexMetadata {
                        name: "orders_pkey".to_string(),
                        expressions: vec!["id".to_string()],
                        unique: true,
                        primary: true,
                    }],
                }],
            }],
        }
    }

    #[test]
    fn resolves_default_schema() {
        let db = snapshot();
        assert!(db.table(Dialect::Postgres, None, "orders").is_some());
        assert!(db.table(Dialect::Postgres, Some("sales"), "orders").is_none());
    }

    #[test]
    fn finds_index_across_tables() {
        let db = snapshot();
        let schema = db.schema(Dialect::Postgres, None).unwrap();
        let (table, index) = schema.index(Dialect::Postgres, "orders_pkey").unwrap();
        assert_eq!(table.name, "orders");
        assert!(index.primary);
    }

    #[test]
    fn deserializes_column_type_field() {
        let column: ColumnMetadata =
            serde_json::from_str(r#"{"name":"id","type":"bigint"}"#).unwrap();
        assert_eq!(column.data_type.as_deref(), Some("bigint"));
        assert!(column.nullable);
    }
}
