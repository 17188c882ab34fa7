//! Schema Rendering
//!
//! Markdown rendering of a `SchemaModel` for the generator context.
//! Output is deterministic and keeps source order.

use crate::schema::model::SchemaModel;

pub fn render_schema(schema: &SchemaModel) -> String {
    let mut lines = vec!["# DATABASE CONTEXT (auto-generated)\n".to_string()];

    for table in schema.tables() {
        lines.push(format!("## TABLE: {}", table.name));
        for c in &table.columns {
            let not_null = if c.not_null { " NOT NULL" } else { "" };
            let pk = if c.primary_key { " PK" } else { "" };
            let fk = if c.foreign_key { " FK" } else { "" };
            lines.push(format!(
                "- **`{}`** ({}){}{}{}",
                c.name, c.data_type, not_null, pk, fk
            ));
        }
        lines.push(String::new());
    }

    lines.push("## RELATIONSHIPS".to_string());
    for r in schema.relations() {
        lines.push(format!(
            "- {}.{} → {}.{}",
            r.source_table, r.source_column, r.target_table, r.target_column
        ));
    }

    lines.push("## ENUMS".to_string());
    for e in schema.enums() {
        lines.push(format!("- {}: {}", e.name, e.values.join(", ")));
    }

    if !schema.indexes().is_empty() {
        lines.push("## INDEXES".to_string());
        for idx in schema.indexes() {
            lines.push(format!("- {}.{}: {}", idx.table, idx.column, idx.reason));
        }
    }

    lines.push("## BUSINESS RULES".to_string());
    for r in schema.rules() {
        lines.push(format!("- {}: {}", r.heading, r.detail));
    }

    lines.join("\n")
}

/// Few-shot examples, numbered from 1
pub fn render_examples(schema: &SchemaModel) -> String {
    schema
        .examples()
        .iter()
        .enumerate()
        .map(|(i, e)| format!("-- Example {}\n{}\n", i + 1, e.sql))
        .collect::<Vec<_>>()
        .join("\n\n")
}
