//! Row samples from exported CSV files (`<dir>/<table>.csv`)

use crate::context::RowSampler;
use crate::error::{HealerError, Result};
use async_trait::async_trait;
use std::path::PathBuf;

pub struct CsvSampler {
    dir: PathBuf,
}

impl CsvSampler {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl RowSampler for CsvSampler {
    async fn sample(&self, table: &str, limit: usize) -> Result<String> {
        let path = self.dir.join(format!("{}.csv", table));
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            HealerError::Sampler(format!("cannot read {}: {}", path.display(), e))
        })?;

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records().take(limit) {
            rows.push(record?.iter().map(str::to_string).collect());
        }

        Ok(render_markdown_table(&headers, &rows))
    }
}

/// Pipe table with a header separator. Empty when there are no rows.
pub fn render_markdown_table(headers: &[String], rows: &[Vec<String>]) -> String {
    if headers.is_empty() || rows.is_empty() {
        return String::new();
    }

    let line = |cells: &[String]| {
        let cells: Vec<String> = cells.iter().map(|c| escape_cell(c)).collect();
        format!("| {} |", cells.join(" | "))
    };

    let mut out = vec![line(headers)];
    out.push(format!("|{}", " --- |".repeat(headers.len())));
    out.extend(rows.iter().map(|r| line(r)));
    out.join("\n")
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_render_markdown_table() {
        let headers = vec!["id".to_string(), "note".to_string()];
        let rows = vec![vec!["1".to_string(), "a|b".to_string()]];
        assert_eq!(
            render_markdown_table(&headers, &rows),
            "| id | note |\n| --- | --- |\n| 1 | a\\|b |"
        );
    }

    #[test]
    fn test_render_empty_rows() {
        assert_eq!(render_markdown_table(&["id".to_string()], &[]), "");
    }

    #[tokio::test]
    async fn test_csv_sampler_limits_rows() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("invoices.csv"),
            "id,totalAmount\ninv-1,10\ninv-2,20\ninv-3,30\ninv-4,40\n",
        )
        .unwrap();

        let sampler = CsvSampler::new(dir.path());
        let table = sampler.sample("invoices", 3).await.unwrap();
        assert_eq!(table.lines().count(), 5);
        assert!(table.contains("| inv-3 | 30 |"));
        assert!(!table.contains("inv-4"));
    }

    #[tokio::test]
    async fn test_csv_sampler_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvSampler::new(dir.path()).sample("vendors", 3).await.unwrap_err();
        assert!(matches!(err, HealerError::Sampler(_)));
    }
}
