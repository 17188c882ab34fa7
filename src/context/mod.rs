//! Context Assembly
//!
//! Builds the grounding text handed to the generator: business rules, the
//! rendered schema, per-table row samples and few-shot examples, in that
//! order. `ContextStore` caches the latest bundle for a fixed time-to-live.

pub mod sampler;

pub use sampler::{render_markdown_table, CsvSampler};

use crate::error::Result;
use crate::schema::{render_examples, render_schema, SchemaModel};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Rows sampled per table unless configured otherwise
pub const DEFAULT_SAMPLE_ROWS: usize = 3;

/// Cache lifetime of a context bundle
pub const DEFAULT_CONTEXT_TTL: Duration = Duration::from_secs(300);

/// Rules used when no business rules file is configured
pub const DEFAULT_BUSINESS_RULES: &str = "# BUSINESS RULES
- totalAmount = subtotal + taxAmount - discountAmount
- Negative totals = credit note
- status must be valid InvoiceStatus
- quantity > 0, unitPrice >= 0";

/// Supplies a handful of rows per table, rendered as text.
#[async_trait]
pub trait RowSampler: Send + Sync {
    async fn sample(&self, table: &str, limit: usize) -> Result<String>;
}

/// Immutable context snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBundle {
    text: String,
    built_at: DateTime<Utc>,
}

impl ContextBundle {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Whether the bundle is younger than `ttl` at `now`.
    /// A build time in the future counts as stale.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        (now - self.built_at)
            .to_std()
            .map(|age| age < ttl)
            .unwrap_or(false)
    }
}

pub struct ContextAssembler {
    sample_rows: usize,
}

impl ContextAssembler {
    pub fn new(sample_rows: usize) -> Self {
        Self { sample_rows }
    }

    /// Assemble a bundle. Sampler failures drop that table's section.
    pub async fn build(
        &self,
        schema: &SchemaModel,
        rule_text: &str,
        sampler: &dyn RowSampler,
    ) -> ContextBundle {
        let mut parts = vec![rule_text.to_string(), render_schema(schema)];

        for table in schema.tables() {
            match sampler.sample(&table.name, self.sample_rows).await {
                Ok(rows) if rows.trim().is_empty() => {
                    debug!(table = %table.name, "No sample rows");
                }
                Ok(rows) => parts.push(format!("### SAMPLE {}\n{}\n", table.name, rows)),
                Err(e) => warn!(table = %table.name, error = %e, "Could not sample table"),
            }
        }

        parts.push(format!("## FEW-SHOT EXAMPLES\n{}", render_examples(schema)));

        ContextBundle {
            text: parts.join("\n\n"),
            built_at: Utc::now(),
        }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_ROWS)
    }
}

/// Process-wide holder of the current context bundle.
///
/// The lock only guards the pointer swap. Rebuilds happen outside it, so two
/// callers hitting an expired bundle may both rebuild; the results are equal.
pub struct ContextStore {
    schema: Arc<SchemaModel>,
    rule_text: String,
    sampler: Arc<dyn RowSampler>,
    assembler: ContextAssembler,
    ttl: Duration,
    current: RwLock<Option<Arc<ContextBundle>>>,
}

impl ContextStore {
    pub fn new(
        schema: Arc<SchemaModel>,
        rule_text: impl Into<String>,
        sampler: Arc<dyn RowSampler>,
        assembler: ContextAssembler,
        ttl: Duration,
    ) -> Self {
        Self {
            schema,
            rule_text: rule_text.into(),
            sampler,
            assembler,
            ttl,
            current: RwLock::new(None),
        }
    }

    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    /// Cached bundle if still fresh, otherwise a freshly built one
    pub async fn get_context(&self) -> Arc<ContextBundle> {
        if let Some(bundle) = self.cached(Utc::now()) {
            return bundle;
        }

        let bundle = Arc::new(
            self.assembler
                .build(&self.schema, &self.rule_text, self.sampler.as_ref())
                .await,
        );
        info!(bytes = bundle.text().len(), "Rebuilt schema context");

        let mut slot = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(Arc::clone(&bundle));
        bundle
    }

    fn cached(&self, now: DateTime<Utc>) -> Option<Arc<ContextBundle>> {
        let slot = match self.current.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.as_ref()
            .filter(|b| b.is_fresh(now, self.ttl))
            .map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HealerError;
    use crate::schema::fixtures::SAMPLE_DOC;
    use crate::schema::SchemaDocumentParser;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticSampler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RowSampler for StaticSampler {
        async fn sample(&self, table: &str, _limit: usize) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if table == "vendors" {
                return Err(HealerError::Sampler("relation does not exist".to_string()));
            }
            Ok("| id |\n| --- |\n| inv-1 |".to_string())
        }
    }

    fn schema() -> Arc<SchemaModel> {
        Arc::new(SchemaDocumentParser::new().parse(SAMPLE_DOC).unwrap())
    }

    fn sampler() -> Arc<StaticSampler> {
        Arc::new(StaticSampler {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_bundle_section_order() {
        let schema = schema();
        let bundle = ContextAssembler::default()
            .build(&schema, DEFAULT_BUSINESS_RULES, sampler().as_ref())
            .await;
        let text = bundle.text();

        let rules = text.find("# BUSINESS RULES\n- totalAmount").unwrap();
        let rendered = text.find("# DATABASE CONTEXT").unwrap();
        let sample = text.find("### SAMPLE invoices").unwrap();
        let examples = text.find("## FEW-SHOT EXAMPLES").unwrap();
        assert!(rules < rendered && rendered < sample && sample < examples);
    }

    #[tokio::test]
    async fn test_failed_sample_is_omitted() {
        let schema = schema();
        let bundle = ContextAssembler::default()
            .build(&schema, DEFAULT_BUSINESS_RULES, sampler().as_ref())
            .await;
        assert!(!bundle.text().contains("### SAMPLE vendors"));
        assert!(bundle.text().contains("### SAMPLE invoices\n| id |"));
    }

    #[tokio::test]
    async fn test_builds_are_byte_identical() {
        let schema = schema();
        let sampler = sampler();
        let assembler = ContextAssembler::default();
        let first = assembler.build(&schema, "rules", sampler.as_ref()).await;
        let second = assembler.build(&schema, "rules", sampler.as_ref()).await;
        assert_eq!(first.text(), second.text());
    }

    #[tokio::test]
    async fn test_store_reuses_fresh_bundle() {
        let sampler = sampler();
        let store = ContextStore::new(
            schema(),
            "rules",
            sampler.clone(),
            ContextAssembler::default(),
            DEFAULT_CONTEXT_TTL,
        );

        let first = store.get_context().await;
        let second = store.get_context().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(sampler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_store_rebuilds_after_ttl() {
        let sampler = sampler();
        let store = ContextStore::new(
            schema(),
            "rules",
            sampler.clone(),
            ContextAssembler::default(),
            Duration::ZERO,
        );

        let first = store.get_context().await;
        let second = store.get_context().await;
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.text(), second.text());
        assert_eq!(sampler.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_future_build_time_is_stale() {
        let bundle = ContextBundle {
            text: String::new(),
            built_at: Utc::now() + chrono::Duration::seconds(60),
        };
        assert!(!bundle.is_fresh(Utc::now(), DEFAULT_CONTEXT_TTL));
    }
}
