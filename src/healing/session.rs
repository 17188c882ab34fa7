//! Per-question session state

use crate::executor::Record;
use crate::healing::error_classifier::SqlErrorClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealingState {
    Drafting,
    Sanitizing,
    Executing,
    Retrying,
    Success,
    Failed,
}

impl HealingState {
    pub fn is_terminal(self) -> bool {
        matches!(self, HealingState::Success | HealingState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub class: SqlErrorClass,
    pub reason: String,
}

/// One trip through Drafting → Sanitizing → Executing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAttempt {
    pub question: String,
    /// Raw generator output; `None` when generation itself failed
    pub generated_sql: Option<String>,
    pub sanitized_sql: Option<String>,
    pub failure: Option<AttemptFailure>,
}

impl QueryAttempt {
    /// SQL replayed to the generator on retry: sanitized if available, else raw
    pub fn turn_sql(&self) -> Option<&str> {
        self.sanitized_sql
            .as_deref()
            .or(self.generated_sql.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct HealingSession {
    id: Uuid,
    question: String,
    attempts: Vec<QueryAttempt>,
    max_attempts: u8,
    state: HealingState,
}

impl HealingSession {
    pub fn new(question: impl Into<String>, max_attempts: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: question.into(),
            attempts: Vec::new(),
            max_attempts,
            state: HealingState::Drafting,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn attempts(&self) -> &[QueryAttempt] {
        &self.attempts
    }

    pub fn state(&self) -> HealingState {
        self.state
    }

    pub fn transition(&mut self, next: HealingState) {
        self.state = next;
    }

    /// Record a failed attempt and move to Retrying, or Failed once the
    /// budget is spent.
    pub fn record_failure(&mut self, attempt: QueryAttempt) {
        self.attempts.push(attempt);
        self.state = if self.is_exhausted() {
            HealingState::Failed
        } else {
            HealingState::Retrying
        };
    }

    /// 1-based number of the attempt in progress
    pub fn current_attempt(&self) -> u8 {
        self.attempts.len() as u8 + 1
    }

    pub fn attempts_made(&self) -> u8 {
        self.attempts.len() as u8
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts.len() >= self.max_attempts as usize
    }
}

/// Successful answer to a question
#[derive(Debug, Clone, Serialize)]
pub struct HealingOutcome {
    pub sql: String,
    pub rows: Vec<Record>,
    /// Attempts used, including the successful one
    pub attempts: u8,
}
