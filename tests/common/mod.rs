//! Shared doubles for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use sql_healer::context::{ContextAssembler, ContextStore, RowSampler, DEFAULT_BUSINESS_RULES};
use sql_healer::executor::{Record, SqlStore};
use sql_healer::llm::{ChatMessage, SqlGenerator};
use sql_healer::{HealerError, Result, SchemaDocumentParser};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SCHEMA_DOC: &str = r#"# Invoice Database

┌────────────────────────────────────────────┐
│ VENDORS                                    │
├───────────────────┬────────────────────────┤
│ id PK             │ TEXT NOT NULL          │
│ name              │ TEXT NOT NULL          │
└───────────────────┴────────────────────────┘

┌────────────────────────────────────────────┐
│ INVOICES                                   │
├───────────────────┬────────────────────────┤
│ id PK             │ TEXT NOT NULL          │
│ invoiceNumber     │ TEXT NOT NULL          │
│ vendorId FK       │ TEXT NOT NULL          │
│ totalAmount       │ DECIMAL(12,2)          │
│ dueDate           │ TIMESTAMP              │
│ status            │ InvoiceStatus          │
└───────────────────┴────────────────────────┘

## Relationships

invoices.vendorId → vendors.id

```
enum InvoiceStatus {
  "DRAFT"
  "PAID"
  "OVERDUE"
}
```

## Example Queries

```sql
SELECT "status", COUNT(*) FROM "invoices" GROUP BY "status";
```
"#;

pub enum Reply {
    Sql(&'static str),
    Fail(&'static str),
    Hang,
}

/// Generator that plays back scripted replies and records every conversation.
/// Once the script runs out the last reply repeats.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<&'static str>>,
    pub conversations: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            conversations: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }

    pub fn conversation(&self, index: usize) -> Vec<ChatMessage> {
        self.conversations.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl SqlGenerator for ScriptedGenerator {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.conversations.lock().unwrap().push(messages.to_vec());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Sql(sql)) => {
                *self.last.lock().unwrap() = Some(sql);
                Ok(sql.to_string())
            }
            Some(Reply::Fail(reason)) => Err(HealerError::Llm(reason.to_string())),
            Some(Reply::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => match *self.last.lock().unwrap() {
                Some(sql) => Ok(sql.to_string()),
                None => Err(HealerError::Llm("script exhausted".to_string())),
            },
        }
    }
}

pub enum StoreReply {
    Rows(Vec<Record>),
    Fail {
        code: &'static str,
        message: &'static str,
        hint: Option<&'static str>,
    },
    Hang,
}

/// Store that plays back scripted results; empty rows once the script runs out
pub struct ScriptedStore {
    replies: Mutex<VecDeque<StoreReply>>,
    pub executed: Mutex<Vec<String>>,
}

impl ScriptedStore {
    pub fn new(replies: Vec<StoreReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            executed: Mutex::new(Vec::new()),
        })
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlStore for ScriptedStore {
    async fn fetch_rows(&self, sql: &str, _time_bound: Duration) -> Result<Vec<Record>> {
        self.executed.lock().unwrap().push(sql.to_string());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            None => Ok(Vec::new()),
            Some(StoreReply::Rows(rows)) => Ok(rows),
            Some(StoreReply::Fail {
                code,
                message,
                hint,
            }) => Err(HealerError::Store {
                message: message.to_string(),
                code: Some(code.to_string()),
                hint: hint.map(str::to_string),
            }),
            Some(StoreReply::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

pub struct FixedSampler;

#[async_trait]
impl RowSampler for FixedSampler {
    async fn sample(&self, table: &str, _limit: usize) -> Result<String> {
        Ok(format!("| id |\n| --- |\n| {}-1 |", table))
    }
}

pub fn record(value: serde_json::Value) -> Record {
    serde_json::from_value(value).unwrap()
}

pub fn context_store() -> Arc<ContextStore> {
    let schema = SchemaDocumentParser::new().parse(SCHEMA_DOC).unwrap();
    Arc::new(ContextStore::new(
        Arc::new(schema),
        DEFAULT_BUSINESS_RULES,
        Arc::new(FixedSampler),
        ContextAssembler::default(),
        Duration::from_secs(300),
    ))
}
