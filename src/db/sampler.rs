//! Row samples pulled live from PostgreSQL

use crate::context::{render_markdown_table, RowSampler};
use crate::db::quote_ident;
use crate::error::{HealerError, Result};
use crate::executor::Record;
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

pub struct PgRowSampler {
    pool: PgPool,
}

impl PgRowSampler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RowSampler for PgRowSampler {
    async fn sample(&self, table: &str, limit: usize) -> Result<String> {
        let sql = format!(
            "SELECT row_to_json(t)::text AS json_row FROM {} AS t LIMIT {}",
            quote_ident(table),
            limit
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| HealerError::Sampler(format!("Failed to sample {}: {}", table, e)))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let text: String = row
                .try_get("json_row")
                .map_err(|e| HealerError::Sampler(e.to_string()))?;
            records.push(serde_json::from_str::<Record>(&text)?);
        }

        Ok(records_to_markdown(&records))
    }
}

/// Markdown table over JSON rows; headers come from the first row
pub(crate) fn records_to_markdown(records: &[Record]) -> String {
    let Some(first) = records.first() else {
        return String::new();
    };
    let headers: Vec<String> = first.keys().cloned().collect();
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|h| match record.get(h) {
                    None | Some(serde_json::Value::Null) => String::new(),
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                })
                .collect()
        })
        .collect();

    render_markdown_table(&headers, &rows)
}
