use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HealerError {
    #[error("Schema parse error: {0}")]
    Parse(String),

    #[error("Unsafe query: {0}")]
    UnsafeQuery(String),

    #[error("Store error: {message}")]
    Store {
        message: String,
        /// SQLSTATE reported by the store, if any
        code: Option<String>,
        /// Hint text the store attached to the error
        hint: Option<String>,
    },

    #[error("Query timed out after {} seconds", .0.as_secs_f64())]
    QueryTimeout(Duration),

    #[error("Could not answer the question after {attempts} attempts")]
    HealingExhausted { attempts: u8 },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Sampler error: {0}")]
    Sampler(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl HealerError {
    /// Store error without SQLSTATE or hint
    pub fn store(message: impl Into<String>) -> Self {
        HealerError::Store {
            message: message.into(),
            code: None,
            hint: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HealerError>;
