//! Prompt construction for SQL drafting
//!
//! A conversation is the system instructions, one user turn carrying the
//! context and the question, and then one assistant/user pair per earlier
//! failed attempt so the generator sees every mistake it already made.

use crate::healing::QueryAttempt;
use crate::llm::ChatMessage;

pub const SYSTEM_PROMPT: &str = "You are a PostgreSQL expert. Generate ONE valid SELECT query.
- Use only tables/columns from the context.
- End with semicolon.
- No markdown, no explanation.";

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    pub fn build(&self, context: &str, question: &str, prior: &[QueryAttempt]) -> Vec<ChatMessage> {
        let mut messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(format!(
                "Context:\n{}\n\nQuestion: {}\nSQL:",
                context, question
            )),
        ];

        for attempt in prior {
            let (Some(sql), Some(failure)) = (attempt.turn_sql(), attempt.failure.as_ref()) else {
                continue;
            };
            messages.push(ChatMessage::assistant(sql));

            let mut feedback = format!("Error: {}", failure.reason);
            if let Some(hint) = failure.class.recovery_hint() {
                feedback.push('\n');
                feedback.push_str(hint);
            }
            feedback.push_str("\nFix the SQL. Only SQL.");
            messages.push(ChatMessage::user(feedback));
        }

        messages
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}
