//! Read-only statement execution against PostgreSQL
//!
//! Every statement runs in its own `READ ONLY` transaction with a local
//! `statement_timeout`, so the server cancels runaway queries itself even
//! after the executor has stopped waiting. Rows come back through
//! `row_to_json`, which keeps select-list order.

use crate::error::{HealerError, Result};
use crate::executor::{Record, SqlStore};
use async_trait::async_trait;
use sqlx::postgres::{PgDatabaseError, PgPool};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, warn};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SqlStore for PgStore {
    async fn fetch_rows(&self, sql: &str, time_bound: Duration) -> Result<Vec<Record>> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        sqlx::query(&format!(
            "SET LOCAL statement_timeout = {}",
            time_bound.as_millis().max(1)
        ))
        .execute(&mut *tx)
        .await
        .map_err(store_error)?;

        let wrapped = wrap_as_json(sql);
        debug!("Store statement: {}", wrapped);
        let fetched = sqlx::query(&wrapped).fetch_all(&mut *tx).await;

        if let Err(e) = tx.rollback().await {
            warn!("Rollback of read-only transaction failed: {}", e);
        }

        let mut records = Vec::new();
        for row in fetched.map_err(store_error)? {
            let text: String = row.try_get("json_row").map_err(store_error)?;
            records.push(serde_json::from_str::<Record>(&text)?);
        }
        Ok(records)
    }
}

/// Turn each result row into one JSON object column
pub(crate) fn wrap_as_json(sql: &str) -> String {
    let body = sql.trim().trim_end_matches(';').trim_end();
    format!("SELECT row_to_json(q)::text AS json_row FROM ({}) AS q", body)
}

/// Map a sqlx error onto a store error, keeping SQLSTATE and hint
pub(crate) fn store_error(error: sqlx::Error) -> HealerError {
    match error.as_database_error() {
        Some(db) => HealerError::Store {
            message: db.message().to_string(),
            code: db.code().map(|c| c.into_owned()),
            hint: db
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.hint())
                .map(str::to_string),
        },
        None => HealerError::store(error.to_string()),
    }
}
