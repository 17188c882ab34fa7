//! Runtime configuration from environment variables

use crate::context::{DEFAULT_CONTEXT_TTL, DEFAULT_SAMPLE_ROWS};
use crate::error::{HealerError, Result};
use crate::executor::{DEFAULT_QUERY_TIMEOUT, DEFAULT_ROW_LIMIT};
use crate::healing::DEFAULT_GENERATION_TIMEOUT;
use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct HealerConfig {
    pub database_url: String,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub schema_doc: PathBuf,
    pub business_rules_path: Option<PathBuf>,
    /// CSV exports to sample from; `None` samples the live database
    pub samples_dir: Option<PathBuf>,
    pub sample_rows: usize,
    pub column_map_path: Option<PathBuf>,
    pub context_ttl: Duration,
    pub query_timeout: Duration,
    pub generation_timeout: Duration,
    pub row_limit: usize,
}

impl HealerConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| HealerError::Config("DATABASE_URL is not set".to_string()))?;
        let api_key = get("GROQ_API_KEY")
            .or_else(|| get("OPENAI_API_KEY"))
            .ok_or_else(|| {
                HealerError::Config("GROQ_API_KEY or OPENAI_API_KEY must be set".to_string())
            })?;

        Ok(Self {
            database_url,
            api_key,
            model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            schema_doc: get("SCHEMA_DOC")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("DATABASE_SCHEMA.md")),
            business_rules_path: get("BUSINESS_RULES_PATH").map(PathBuf::from),
            samples_dir: get("SAMPLES_DIR").map(PathBuf::from),
            sample_rows: parse_or("SAMPLE_ROWS", get("SAMPLE_ROWS"), DEFAULT_SAMPLE_ROWS)?,
            column_map_path: get("COLUMN_MAP_PATH").map(PathBuf::from),
            context_ttl: secs_or("CONTEXT_TTL_SECS", get("CONTEXT_TTL_SECS"), DEFAULT_CONTEXT_TTL)?,
            query_timeout: secs_or(
                "QUERY_TIMEOUT_SECS",
                get("QUERY_TIMEOUT_SECS"),
                DEFAULT_QUERY_TIMEOUT,
            )?,
            generation_timeout: secs_or(
                "GENERATION_TIMEOUT_SECS",
                get("GENERATION_TIMEOUT_SECS"),
                DEFAULT_GENERATION_TIMEOUT,
            )?,
            row_limit: parse_or("ROW_LIMIT", get("ROW_LIMIT"), DEFAULT_ROW_LIMIT)?,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            HealerError::Config(format!("{} must be a non-negative integer, got '{}'", key, raw))
        }),
    }
}

fn secs_or(key: &str, value: Option<String>, default: Duration) -> Result<Duration> {
    let secs = parse_or(key, value, default.as_secs())?;
    if secs == 0 && key != "CONTEXT_TTL_SECS" {
        return Err(HealerError::Config(format!("{} must be greater than zero", key)));
    }
    Ok(Duration::from_secs(secs))
}
