//! Healing Loop
//!
//! Bounded retry loop that feeds every failure back to the generator.

use crate::context::ContextStore;
use crate::error::{HealerError, Result};
use crate::executor::{BoundedExecutor, SqlStore, DEFAULT_QUERY_TIMEOUT, DEFAULT_ROW_LIMIT};
use crate::healing::error_classifier::{ErrorClassifier, SqlErrorClass};
use crate::healing::session::{
    AttemptFailure, HealingOutcome, HealingSession, HealingState, QueryAttempt,
};
use crate::healing::MAX_ATTEMPTS;
use crate::llm::SqlGenerator;
use crate::prompt::PromptBuilder;
use crate::sanitizer::SqlSanitizer;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

/// Default bound on one generator call
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Drives generator → sanitizer → executor until one attempt succeeds.
pub struct HealingLoop {
    context: Arc<ContextStore>,
    generator: Arc<dyn SqlGenerator>,
    sanitizer: SqlSanitizer,
    executor: BoundedExecutor,
    prompt: PromptBuilder,
    error_classifier: ErrorClassifier,
    query_timeout: Duration,
    generation_timeout: Duration,
    row_limit: usize,
}

impl HealingLoop {
    pub fn new(
        context: Arc<ContextStore>,
        generator: Arc<dyn SqlGenerator>,
        store: Arc<dyn SqlStore>,
    ) -> Self {
        Self {
            context,
            generator,
            sanitizer: SqlSanitizer::default(),
            executor: BoundedExecutor::new(store),
            prompt: PromptBuilder::default(),
            error_classifier: ErrorClassifier::new(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            row_limit: DEFAULT_ROW_LIMIT,
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: SqlSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_timeouts(mut self, query_timeout: Duration, generation_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self.generation_timeout = generation_timeout;
        self
    }

    pub fn with_row_limit(mut self, row_limit: usize) -> Self {
        self.row_limit = row_limit;
        self
    }

    /// Answer one question. Returns the first successful attempt, or
    /// `HealingExhausted` once the attempt budget is spent.
    pub async fn run(&self, question: &str, cancel: &CancellationToken) -> Result<HealingOutcome> {
        let mut session = HealingSession::new(question, MAX_ATTEMPTS);
        let span = info_span!("healing_session", session_id = %session.id());
        self.drive(&mut session, cancel).instrument(span).await
    }

    async fn drive(
        &self,
        session: &mut HealingSession,
        cancel: &CancellationToken,
    ) -> Result<HealingOutcome> {
        info!("Question: {}", session.question());

        while !session.is_exhausted() {
            let attempt_no = session.current_attempt();
            info!("Healing attempt {} of {}", attempt_no, MAX_ATTEMPTS);

            // Drafting
            ensure_active(cancel)?;
            session.transition(HealingState::Drafting);
            let context = self.context.get_context().await;
            let messages = self
                .prompt
                .build(context.text(), session.question(), session.attempts());

            let draft = until_cancelled(
                cancel,
                tokio::time::timeout(self.generation_timeout, self.generator.complete(&messages)),
            )
            .await?;

            let raw = match draft {
                Ok(Ok(raw)) => raw,
                Ok(Err(e)) => {
                    self.fail(session, None, None, SqlErrorClass::Generation, e.to_string());
                    continue;
                }
                Err(_) => {
                    let reason = format!(
                        "generation timed out after {} seconds",
                        self.generation_timeout.as_secs_f64()
                    );
                    self.fail(session, None, None, SqlErrorClass::Generation, reason);
                    continue;
                }
            };

            // Sanitizing
            ensure_active(cancel)?;
            session.transition(HealingState::Sanitizing);
            let sanitized = match self.sanitizer.sanitize(&raw) {
                Ok(sql) => sql,
                Err(e) => {
                    let class = self.error_classifier.classify(&e);
                    self.fail(session, Some(raw), None, class, e.to_string());
                    continue;
                }
            };

            // Executing
            ensure_active(cancel)?;
            session.transition(HealingState::Executing);
            let executed = until_cancelled(
                cancel,
                self.executor
                    .execute(&sanitized, self.query_timeout, self.row_limit),
            )
            .await?;

            match executed {
                Ok(rows) => {
                    session.transition(HealingState::Success);
                    info!(rows = rows.len(), "✅ Query succeeded on attempt {}", attempt_no);
                    return Ok(HealingOutcome {
                        sql: sanitized,
                        rows,
                        attempts: attempt_no,
                    });
                }
                Err(e) => {
                    if let HealerError::QueryTimeout(bound) = &e {
                        warn!(timeout_secs = bound.as_secs_f64(), "Query timed out");
                    }
                    let class = self.error_classifier.classify(&e);
                    let reason = self.store_feedback(&e, &class);
                    self.fail(session, Some(raw), Some(sanitized), class, reason);
                }
            }
        }

        warn!(
            attempts = session.attempts_made(),
            "Giving up on question: {}",
            session.question()
        );
        Err(HealerError::HealingExhausted {
            attempts: session.attempts_made(),
        })
    }

    fn fail(
        &self,
        session: &mut HealingSession,
        generated_sql: Option<String>,
        sanitized_sql: Option<String>,
        class: SqlErrorClass,
        reason: String,
    ) {
        warn!(
            attempt = session.current_attempt(),
            class = %class,
            "Attempt failed: {}",
            reason
        );
        let attempt = QueryAttempt {
            question: session.question().to_string(),
            generated_sql,
            sanitized_sql,
            failure: Some(AttemptFailure { class, reason }),
        };
        session.record_failure(attempt);
    }

    /// Store message plus the store's own hint, or column suggestions from
    /// the schema when the store gave none.
    fn store_feedback(&self, error: &HealerError, class: &SqlErrorClass) -> String {
        let (message, hint) = match error {
            HealerError::Store { message, hint, .. } => (message.clone(), hint.clone()),
            other => (other.to_string(), None),
        };

        if let Some(hint) = hint {
            return format!("{}\n\nHINT FROM DB: {}", message, hint);
        }

        if *class == SqlErrorClass::UndefinedColumn {
            if let Some(missing) = ErrorClassifier::missing_column(&message) {
                let suggestions = self
                    .error_classifier
                    .suggest_columns(&missing, self.context.schema().column_names());
                if !suggestions.is_empty() {
                    return format!("{}\n\nDid you mean: {}?", message, suggestions.join(", "));
                }
            }
        }

        message
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        info!("Session cancelled");
        return Err(HealerError::Cancelled);
    }
    Ok(())
}

async fn until_cancelled<F: Future>(cancel: &CancellationToken, work: F) -> Result<F::Output> {
    tokio::select! {
        _ = cancel.cancelled() => {
            info!("Session cancelled");
            Err(HealerError::Cancelled)
        }
        output = work => Ok(output),
    }
}
