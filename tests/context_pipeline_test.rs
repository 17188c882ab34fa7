mod common;

use common::SCHEMA_DOC;
use sql_healer::context::{
    ContextAssembler, ContextStore, CsvSampler, DEFAULT_BUSINESS_RULES,
};
use sql_healer::{HealerError, SchemaDocument, SqlSanitizer};
use std::fs;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_context_from_document_and_csv_samples() {
    let dir = tempfile::tempdir().unwrap();
    let doc_path = dir.path().join("DATABASE_SCHEMA.md");
    fs::write(&doc_path, SCHEMA_DOC).unwrap();
    fs::write(
        dir.path().join("invoices.csv"),
        "id,invoiceNumber,totalAmount\ninv-1,INV-001,120.50\ninv-2,INV-002,80.00\n",
    )
    .unwrap();

    let schema = SchemaDocument::load(&doc_path).unwrap().parse().unwrap();
    let tables: Vec<&str> = schema.tables().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tables, ["vendors", "invoices"]);

    let store = ContextStore::new(
        Arc::new(schema),
        DEFAULT_BUSINESS_RULES,
        Arc::new(CsvSampler::new(dir.path())),
        ContextAssembler::default(),
        Duration::from_secs(300),
    );
    let bundle = store.get_context().await;
    let text = bundle.text();

    assert!(text.starts_with("# BUSINESS RULES"));
    assert!(text.contains("## TABLE: invoices"));
    assert!(text.contains("- invoices.vendorId → vendors.id"));
    assert!(text.contains("- InvoiceStatus: DRAFT, PAID, OVERDUE"));
    assert!(text.contains("### SAMPLE invoices\n| id | invoiceNumber | totalAmount |"));
    // vendors.csv does not exist, so that section is left out
    assert!(!text.contains("### SAMPLE vendors"));
    assert!(text.ends_with(
        "## FEW-SHOT EXAMPLES\n-- Example 1\nSELECT \"status\", COUNT(*) FROM \"invoices\" GROUP BY \"status\";\n"
    ));
}

#[test]
fn test_document_without_tables_is_a_parse_error() {
    let err = SchemaDocument::from_text("# Notes\n\nNothing here yet.\n")
        .parse()
        .unwrap_err();
    assert!(matches!(err, HealerError::Parse(_)));
}

#[test]
fn test_few_shot_example_survives_sanitizing() {
    let sanitizer = SqlSanitizer::default();
    assert_eq!(
        sanitizer
            .sanitize("SELECT \"status\", COUNT(*) FROM \"invoices\" GROUP BY \"status\";")
            .unwrap(),
        "SELECT \"status\", COUNT(*) FROM \"invoices\" GROUP BY \"status\";"
    );
}
