//! Schema Model
//!
//! Typed view of the schema document. Only the parser builds a `SchemaModel`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// First token of the type descriptor, e.g. `TEXT` or `DECIMAL(12,2)`
    pub data_type: String,
    pub primary_key: bool,
    pub foreign_key: bool,
    pub not_null: bool,
    pub has_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Lower-cased table name
    pub name: String,
    /// Columns in source order
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// `source_table.source_column → target_table.target_column`
///
/// Informational only; referenced tables are not checked against the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRelation {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDefinition {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleQuery {
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub heading: String,
    pub detail: String,
}

/// Indexed column noted in the document's index section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHint {
    pub table: String,
    pub column: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaModel {
    tables: Vec<TableDefinition>,
    relations: Vec<ForeignKeyRelation>,
    enums: Vec<EnumDefinition>,
    indexes: Vec<IndexHint>,
    examples: Vec<ExampleQuery>,
    rules: Vec<ValidationRule>,
}

impl SchemaModel {
    pub(crate) fn new(
        tables: Vec<TableDefinition>,
        relations: Vec<ForeignKeyRelation>,
        enums: Vec<EnumDefinition>,
        indexes: Vec<IndexHint>,
        examples: Vec<ExampleQuery>,
        rules: Vec<ValidationRule>,
    ) -> Self {
        Self {
            tables,
            relations,
            enums,
            indexes,
            examples,
            rules,
        }
    }

    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    /// Case-insensitive table lookup
    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        let name = name.to_lowercase();
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn relations(&self) -> &[ForeignKeyRelation] {
        &self.relations
    }

    pub fn enums(&self) -> &[EnumDefinition] {
        &self.enums
    }

    pub fn indexes(&self) -> &[IndexHint] {
        &self.indexes
    }

    pub fn examples(&self) -> &[ExampleQuery] {
        &self.examples
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    /// Every column name in the schema, in table then column order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.tables
            .iter()
            .flat_map(|t| t.columns.iter().map(|c| c.name.as_str()))
    }
}
