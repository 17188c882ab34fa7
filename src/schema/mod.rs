//! Schema document model, parser and renderer

pub mod model;
pub mod parser;
pub mod render;

pub use model::{
    ColumnDefinition, EnumDefinition, ExampleQuery, ForeignKeyRelation, IndexHint, SchemaModel,
    TableDefinition, ValidationRule,
};
pub use parser::{SchemaDocument, SchemaDocumentParser};
pub use render::{render_examples, render_schema};
