//! Error Classifier
//!
//! Classifies attempt failures into a taxonomy for recovery. SQLSTATE codes
//! reported by the store win; message heuristics cover everything else.

use crate::error::HealerError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref MISSING_COLUMN_RE: Regex =
        Regex::new(r#"column "?([A-Za-z0-9_.]+)"? does not exist"#)
            .expect("missing column pattern");
}

/// Minimum normalized similarity for a column suggestion
const SUGGESTION_THRESHOLD: f64 = 0.5;
const MAX_SUGGESTIONS: usize = 3;

/// SQL error classification taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlErrorClass {
    UndefinedColumn,
    UndefinedTable,
    AmbiguousColumn,
    GroupingError,
    SyntaxError,
    UndefinedFunction,
    DatatypeMismatch,
    UnsafeQuery,
    Timeout,
    Generation,
    StoreError(String),
}

impl fmt::Display for SqlErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlErrorClass::UndefinedColumn => write!(f, "UndefinedColumn"),
            SqlErrorClass::UndefinedTable => write!(f, "UndefinedTable"),
            SqlErrorClass::AmbiguousColumn => write!(f, "AmbiguousColumn"),
            SqlErrorClass::GroupingError => write!(f, "GroupingError"),
            SqlErrorClass::SyntaxError => write!(f, "SyntaxError"),
            SqlErrorClass::UndefinedFunction => write!(f, "UndefinedFunction"),
            SqlErrorClass::DatatypeMismatch => write!(f, "DatatypeMismatch"),
            SqlErrorClass::UnsafeQuery => write!(f, "UnsafeQuery"),
            SqlErrorClass::Timeout => write!(f, "Timeout"),
            SqlErrorClass::Generation => write!(f, "Generation"),
            SqlErrorClass::StoreError(code) => write!(f, "StoreError({})", code),
        }
    }
}

impl SqlErrorClass {
    /// Extra instruction appended to the retry turn for this class
    pub fn recovery_hint(&self) -> Option<&'static str> {
        match self {
            SqlErrorClass::UndefinedColumn => Some(
                "Use only column names listed in the context. camelCase names must be written exactly as listed.",
            ),
            SqlErrorClass::UndefinedTable => Some("Use only tables listed in the context."),
            SqlErrorClass::AmbiguousColumn => {
                Some("Qualify every column with its table name or alias.")
            }
            SqlErrorClass::GroupingError => {
                Some("Every selected column that is not aggregated must appear in GROUP BY.")
            }
            SqlErrorClass::SyntaxError => {
                Some("Return a single syntactically valid PostgreSQL SELECT statement.")
            }
            SqlErrorClass::UndefinedFunction => Some(
                "Use built-in PostgreSQL functions only and cast arguments to the expected types.",
            ),
            SqlErrorClass::DatatypeMismatch => Some(
                "Compare values of the same type. Enum values are quoted strings; cast where needed.",
            ),
            SqlErrorClass::UnsafeQuery => Some("Only one read-only SELECT statement is allowed."),
            SqlErrorClass::Timeout => {
                Some("The query was too slow. Filter early and avoid unbounded joins.")
            }
            SqlErrorClass::Generation | SqlErrorClass::StoreError(_) => None,
        }
    }
}

/// Error classifier
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify an error into the taxonomy
    pub fn classify(&self, error: &HealerError) -> SqlErrorClass {
        match error {
            HealerError::UnsafeQuery(_) => return SqlErrorClass::UnsafeQuery,
            HealerError::QueryTimeout(_) => return SqlErrorClass::Timeout,
            HealerError::Llm(_) => return SqlErrorClass::Generation,
            HealerError::Store {
                code: Some(code), ..
            } => {
                if let Some(class) = Self::from_sqlstate(code) {
                    return class;
                }
            }
            _ => {}
        }

        let error_msg = error.to_string().to_lowercase();

        if error_msg.contains("column") && error_msg.contains("does not exist") {
            return SqlErrorClass::UndefinedColumn;
        }

        if error_msg.contains("relation") && error_msg.contains("does not exist") {
            return SqlErrorClass::UndefinedTable;
        }

        if error_msg.contains("ambiguous") && error_msg.contains("column") {
            return SqlErrorClass::AmbiguousColumn;
        }

        if error_msg.contains("group by") || error_msg.contains("aggregate function") {
            return SqlErrorClass::GroupingError;
        }

        if error_msg.contains("syntax error") {
            return SqlErrorClass::SyntaxError;
        }

        if error_msg.contains("function") && error_msg.contains("does not exist") {
            return SqlErrorClass::UndefinedFunction;
        }

        if error_msg.contains("invalid input value for enum")
            || error_msg.contains("operator does not exist")
        {
            return SqlErrorClass::DatatypeMismatch;
        }

        match error {
            HealerError::Store { code, .. } => {
                SqlErrorClass::StoreError(code.clone().unwrap_or_else(|| "unknown".to_string()))
            }
            _ => SqlErrorClass::StoreError(error.to_string()),
        }
    }

    fn from_sqlstate(code: &str) -> Option<SqlErrorClass> {
        let class = match code {
            "42703" => SqlErrorClass::UndefinedColumn,
            "42P01" => SqlErrorClass::UndefinedTable,
            "42702" => SqlErrorClass::AmbiguousColumn,
            "42803" => SqlErrorClass::GroupingError,
            "42601" => SqlErrorClass::SyntaxError,
            "42883" => SqlErrorClass::UndefinedFunction,
            "42804" | "22P02" => SqlErrorClass::DatatypeMismatch,
            "57014" => SqlErrorClass::Timeout,
            _ => return None,
        };
        Some(class)
    }

    /// Column name the store reported as missing, without any qualifier
    pub fn missing_column(message: &str) -> Option<String> {
        MISSING_COLUMN_RE
            .captures(message)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().rsplit('.').next().unwrap_or(m.as_str()).to_string())
    }

    /// Closest known column names to `missing`, best first
    pub fn suggest_columns<'a>(
        &self,
        missing: &str,
        known: impl IntoIterator<Item = &'a str>,
    ) -> Vec<String> {
        let target = missing.to_lowercase().replace('_', "");
        let mut scored: Vec<(f64, &str)> = known
            .into_iter()
            .map(|name| {
                let candidate = name.to_lowercase().replace('_', "");
                (strsim::normalized_levenshtein(&target, &candidate), name)
            })
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut suggestions: Vec<String> = Vec::new();
        for (_, name) in scored {
            if !suggestions.iter().any(|s| s == name) {
                suggestions.push(name.to_string());
            }
            if suggestions.len() == MAX_SUGGESTIONS {
                break;
            }
        }
        suggestions
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn store_error(message: &str, code: Option<&str>) -> HealerError {
        HealerError::Store {
            message: message.to_string(),
            code: code.map(str::to_string),
            hint: None,
        }
    }

    #[test]
    fn test_classify_by_sqlstate() {
        let classifier = ErrorClassifier::new();
        assert_eq!(
            classifier.classify(&store_error("whatever", Some("42P01"))),
            SqlErrorClass::UndefinedTable
        );
        assert_eq!(
            classifier.classify(&store_error("whatever", Some("42803"))),
            SqlErrorClass::GroupingError
        );
    }

    #[test]
    fn test_classify_column_not_found() {
        let classifier = ErrorClassifier::new();
        let error = store_error("column \"total_amount\" does not exist", None);
        assert_eq!(classifier.classify(&error), SqlErrorClass::UndefinedColumn);
    }

    #[test]
    fn test_classify_unknown_code_falls_back_to_message() {
        let classifier = ErrorClassifier::new();
        let error = store_error("syntax error at or near \"FORM\"", Some("XX000"));
        assert_eq!(classifier.classify(&error), SqlErrorClass::SyntaxError);

        let error = store_error("disk full", Some("53100"));
        assert_eq!(
            classifier.classify(&error),
            SqlErrorClass::StoreError("53100".to_string())
        );
    }

    #[test]
    fn test_classify_local_failures() {
        let classifier = ErrorClassifier::new();
        assert_eq!(
            classifier.classify(&HealerError::UnsafeQuery("DELETE".to_string())),
            SqlErrorClass::UnsafeQuery
        );
        assert_eq!(
            classifier.classify(&HealerError::QueryTimeout(Duration::from_secs(15))),
            SqlErrorClass::Timeout
        );
        assert_eq!(
            classifier.classify(&HealerError::Llm("503".to_string())),
            SqlErrorClass::Generation
        );
    }

    #[test]
    fn test_missing_column_strips_qualifier() {
        assert_eq!(
            ErrorClassifier::missing_column("column i.total_amount does not exist"),
            Some("total_amount".to_string())
        );
        assert_eq!(
            ErrorClassifier::missing_column("column \"duedate\" does not exist"),
            Some("duedate".to_string())
        );
        assert_eq!(ErrorClassifier::missing_column("relation \"x\" does not exist"), None);
    }

    #[test]
    fn test_suggest_columns() {
        let classifier = ErrorClassifier::new();
        let known = ["id", "totalAmount", "taxAmount", "dueDate", "vendorId"];
        let suggestions = classifier.suggest_columns("total_amount", known);
        assert_eq!(suggestions.first().map(String::as_str), Some("totalAmount"));
        assert!(!suggestions.contains(&"id".to_string()));
        assert!(suggestions.len() <= MAX_SUGGESTIONS);
    }
}
