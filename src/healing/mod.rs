//! Self-healing query loop
//!
//! Drafts SQL, sanitizes it, runs it, and on failure replays the mistake to
//! the generator. A session stops at the first success or after
//! `MAX_ATTEMPTS` failures.

pub mod error_classifier;
pub mod healing_loop;
pub mod session;

pub use error_classifier::{ErrorClassifier, SqlErrorClass};
pub use healing_loop::{HealingLoop, DEFAULT_GENERATION_TIMEOUT};
pub use session::{AttemptFailure, HealingOutcome, HealingSession, HealingState, QueryAttempt};

/// Attempts per question before giving up
pub const MAX_ATTEMPTS: u8 = 3;
