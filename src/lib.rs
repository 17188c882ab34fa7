pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod executor;
pub mod healing;
pub mod llm;
pub mod prompt;
pub mod sanitizer;
pub mod schema;

pub use config::HealerConfig;
pub use context::{ContextAssembler, ContextBundle, ContextStore, CsvSampler, RowSampler};
pub use error::{HealerError, Result};
pub use executor::{BoundedExecutor, Record, SqlStore};
pub use healing::{HealingLoop, HealingOutcome};
pub use llm::{ChatMessage, LlmClient, Role, SqlGenerator};
pub use prompt::PromptBuilder;
pub use sanitizer::{ColumnMap, SqlSanitizer};
pub use schema::{SchemaDocument, SchemaDocumentParser, SchemaModel};
