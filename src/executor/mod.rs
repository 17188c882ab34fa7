//! Bounded Executor
//!
//! Runs a sanitized statement with an authoritative row cap and a
//! wall-clock bound. The store call runs on its own task; when the bound
//! elapses the executor stops waiting and reports a timeout. The task is
//! detached, not aborted, so a store without native cancellation may keep
//! working on the statement.

use crate::error::{HealerError, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One result row keyed by column name, in select-list order
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Default wall-clock bound for one statement
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Default row cap appended to every statement
pub const DEFAULT_ROW_LIMIT: usize = 500;

/// SQLSTATE for `query_canceled`, raised by a store-side statement timeout
const QUERY_CANCELED: &str = "57014";

lazy_static! {
    static ref TRAILING_LIMIT_RE: Regex =
        Regex::new(r"(?i)\s*\bLIMIT\s+(?:ALL|\d[\d\s+*/-]*)\s*$").expect("trailing limit pattern");
    static ref TRAILING_FETCH_RE: Regex = Regex::new(
        r"(?i)\s*\bFETCH\s+(?:FIRST|NEXT)\s+(?:\d+\s+)?ROWS?\s+(?:ONLY|WITH\s+TIES)\s*$"
    )
    .expect("trailing fetch pattern");
}

/// Relational store that runs read-only statements.
#[async_trait]
pub trait SqlStore: Send + Sync {
    /// Run `sql` and return its rows. `time_bound` is passed so stores with
    /// native statement timeouts can enforce it themselves.
    async fn fetch_rows(&self, sql: &str, time_bound: Duration) -> Result<Vec<Record>>;
}

pub struct BoundedExecutor {
    store: Arc<dyn SqlStore>,
}

impl BoundedExecutor {
    pub fn new(store: Arc<dyn SqlStore>) -> Self {
        Self { store }
    }

    pub async fn execute(
        &self,
        sanitized_sql: &str,
        time_bound: Duration,
        row_limit: usize,
    ) -> Result<Vec<Record>> {
        let statement = with_row_limit(sanitized_sql, row_limit);
        info!("Executing SQL:\n{}", statement);

        let store = Arc::clone(&self.store);
        let task_sql = statement.clone();
        let handle = tokio::spawn(async move { store.fetch_rows(&task_sql, time_bound).await });

        match tokio::time::timeout(time_bound, handle).await {
            Err(_) => {
                warn!(
                    timeout_secs = time_bound.as_secs_f64(),
                    "Query exceeded its time bound, abandoning the wait"
                );
                Err(HealerError::QueryTimeout(time_bound))
            }
            Ok(Err(join_error)) => Err(HealerError::store(format!(
                "query task failed: {}",
                join_error
            ))),
            Ok(Ok(Err(HealerError::Store { code: Some(code), .. }))) if code == QUERY_CANCELED => {
                warn!("Store cancelled the statement at its own timeout");
                Err(HealerError::QueryTimeout(time_bound))
            }
            Ok(Ok(result)) => result,
        }
    }
}

/// Replace any trailing LIMIT or FETCH clause with exactly one `LIMIT <row_limit>;`
pub fn with_row_limit(sql: &str, row_limit: usize) -> String {
    let mut body = sql.trim();
    loop {
        let trimmed = body.trim_end_matches(';').trim_end();
        let clause = TRAILING_LIMIT_RE
            .find(trimmed)
            .or_else(|| TRAILING_FETCH_RE.find(trimmed));
        let stripped = match clause {
            Some(m) => trimmed[..m.start()].trim_end(),
            None => trimmed,
        };
        if stripped.len() == body.len() {
            break;
        }
        body = stripped;
    }
    format!("{} LIMIT {};", body, row_limit)
}
