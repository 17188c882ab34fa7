use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use sql_healer::context::{
    ContextAssembler, ContextStore, CsvSampler, RowSampler, DEFAULT_BUSINESS_RULES,
};
use sql_healer::db::{init_pool, PgRowSampler, PgStore};
use sql_healer::executor::Record;
use sql_healer::healing::HealingLoop;
use sql_healer::llm::LlmClient;
use sql_healer::sanitizer::{ColumnMap, SqlSanitizer};
use sql_healer::schema::SchemaDocument;
use sql_healer::HealerConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sql-healer")]
#[command(about = "Answer questions about an invoice database with self-correcting SQL")]
struct Args {
    /// The question in natural language
    question: String,

    /// Schema document to ground generation on (overrides SCHEMA_DOC)
    #[arg(short, long)]
    schema_doc: Option<PathBuf>,

    /// Directory of `<table>.csv` sample exports (overrides SAMPLES_DIR)
    #[arg(long)]
    samples_dir: Option<PathBuf>,
}

#[derive(Serialize)]
struct Answer<'a> {
    question: &'a str,
    sql: String,
    results: Vec<Record>,
    execution_time: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = HealerConfig::from_env()?;
    if let Some(path) = args.schema_doc {
        config.schema_doc = path;
    }
    if let Some(dir) = args.samples_dir {
        config.samples_dir = Some(dir);
    }

    info!("SQL healer starting...");

    let schema = SchemaDocument::load(&config.schema_doc)
        .with_context(|| format!("reading {}", config.schema_doc.display()))?
        .parse()?;
    info!(tables = schema.tables().len(), "Parsed schema document");

    let rule_text = match &config.business_rules_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => DEFAULT_BUSINESS_RULES.to_string(),
    };
    let column_map = match &config.column_map_path {
        Some(path) => ColumnMap::from_json_file(path)?,
        None => ColumnMap::default(),
    };

    let pool = init_pool(&config.database_url).await?;
    let sampler: Arc<dyn RowSampler> = match &config.samples_dir {
        Some(dir) => Arc::new(CsvSampler::new(dir.clone())),
        None => Arc::new(PgRowSampler::new(pool.clone())),
    };

    let context = Arc::new(ContextStore::new(
        Arc::new(schema),
        rule_text,
        sampler,
        ContextAssembler::new(config.sample_rows),
        config.context_ttl,
    ));
    let llm = LlmClient::with_endpoint(
        config.api_key.clone(),
        config.base_url.clone(),
        config.model.clone(),
    );

    let healer = HealingLoop::new(context, Arc::new(llm), Arc::new(PgStore::new(pool)))
        .with_sanitizer(SqlSanitizer::new(column_map))
        .with_timeouts(config.query_timeout, config.generation_timeout)
        .with_row_limit(config.row_limit);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let start = Instant::now();
    match healer.run(&args.question, &cancel).await {
        Ok(outcome) => {
            let answer = Answer {
                question: &args.question,
                sql: outcome.sql,
                results: outcome.rows,
                execution_time: (start.elapsed().as_secs_f64() * 1000.0).round() / 1000.0,
            };
            println!("{}", serde_json::to_string_pretty(&answer)?);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            Err(e.into())
        }
    }
}
