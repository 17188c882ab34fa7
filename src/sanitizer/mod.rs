//! SQL Sanitizer
//!
//! Reduces raw generator output to exactly one SELECT statement with every
//! identifier quoted for a case-sensitive store.
//!
//! The candidate is lexed with sqlparser's tokenizer and rewritten token by
//! token. Only tokens the tokenizer produced as words can become quoted
//! identifiers; literals and operators pass through as lexed.

pub mod column_map;

pub use column_map::ColumnMap;

use crate::error::{HealerError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace, Word};
use std::collections::HashSet;
use tracing::debug;

lazy_static! {
    static ref FENCED_BLOCK_RE: Regex =
        Regex::new(r"(?s)```(?:[A-Za-z]+[ \t]*\r?\n)?(.*?)```").expect("fenced block pattern");
    static ref OPEN_FENCE_RE: Regex =
        Regex::new(r"^\s*```(?:[A-Za-z]+)?").expect("open fence pattern");
    static ref LABEL_RE: Regex = Regex::new(r"(?i)^\s*sql\b\s*[:\-]?\s*").expect("label pattern");

    /// Words emitted upper-case and unquoted
    static ref KEYWORDS: HashSet<&'static str> = [
        "SELECT", "DISTINCT", "ALL", "FROM", "WHERE", "AND", "OR", "NOT", "IN", "IS", "NULL",
        "AS", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "NATURAL", "ON",
        "USING", "GROUP", "BY", "ORDER", "ASC", "DESC", "NULLS", "FIRST", "LAST", "HAVING",
        "LIMIT", "OFFSET", "UNION", "INTERSECT", "EXCEPT", "CASE", "WHEN", "THEN", "ELSE",
        "END", "BETWEEN", "LIKE", "ILIKE", "SIMILAR", "ESCAPE", "EXISTS", "ANY", "SOME",
        "TRUE", "FALSE", "WITH", "RECURSIVE", "LATERAL", "OVER", "PARTITION", "WINDOW", "ROWS",
        "RANGE", "PRECEDING", "FOLLOWING", "UNBOUNDED", "CURRENT", "ROW", "FILTER", "WITHIN",
        "FETCH", "NEXT", "ONLY", "TIES", "INTERVAL", "AT", "ZONE", "CURRENT_DATE",
        "CURRENT_TIME", "CURRENT_TIMESTAMP", "LOCALTIMESTAMP",
        // aggregates
        "COUNT", "SUM", "AVG", "MIN", "MAX",
        // date parts
        "YEAR", "MONTH", "DAY", "HOUR", "MINUTE", "SECOND", "WEEK", "QUARTER", "EPOCH", "DOW",
        "DOY",
        // type names
        "INTEGER", "INT", "BIGINT", "SMALLINT", "NUMERIC", "DECIMAL", "REAL", "DOUBLE",
        "PRECISION", "FLOAT", "TEXT", "VARCHAR", "CHAR", "CHARACTER", "VARYING", "BOOLEAN",
        "DATE", "TIME", "TIMESTAMP", "TIMESTAMPTZ", "JSON", "JSONB", "UUID",
    ]
    .into_iter()
    .collect();

    /// Bare words that make a statement something other than a read
    static ref FORBIDDEN_WORDS: HashSet<&'static str> = [
        "INSERT", "UPDATE", "DELETE", "MERGE", "DROP", "ALTER", "CREATE", "TRUNCATE", "GRANT",
        "REVOKE", "COPY", "INTO", "CALL", "EXECUTE", "VACUUM", "REINDEX", "CLUSTER", "LOCK",
        "LISTEN", "NOTIFY",
    ]
    .into_iter()
    .collect();

    /// Server functions with side effects or file/network access
    static ref DENIED_FUNCTIONS: HashSet<&'static str> = [
        "PG_SLEEP", "PG_SLEEP_FOR", "PG_SLEEP_UNTIL", "PG_TERMINATE_BACKEND",
        "PG_CANCEL_BACKEND", "PG_READ_FILE", "PG_READ_BINARY_FILE", "PG_LS_DIR",
        "PG_RELOAD_CONF", "PG_ADVISORY_LOCK", "LO_IMPORT", "LO_EXPORT", "DBLINK",
        "DBLINK_EXEC", "SET_CONFIG",
    ]
    .into_iter()
    .collect();
}

/// Typed token of a rewritten statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlToken {
    /// Upper-cased reserved word
    Keyword(String),
    /// Table, column or alias name; rendered double-quoted
    Identifier(String),
    Function(String),
    /// Name following `::`
    TypeName(String),
    Wildcard,
    Literal(String),
    Symbol(String),
    Whitespace(String),
}

impl SqlToken {
    pub fn render(&self) -> String {
        match self {
            SqlToken::Keyword(k) => k.clone(),
            SqlToken::Identifier(name) => format!("\"{}\"", name.replace('"', "\"\"")),
            SqlToken::Function(name) | SqlToken::TypeName(name) => name.clone(),
            SqlToken::Wildcard => "*".to_string(),
            SqlToken::Literal(text) | SqlToken::Symbol(text) | SqlToken::Whitespace(text) => {
                text.clone()
            }
        }
    }

    fn is_whitespace(&self) -> bool {
        matches!(self, SqlToken::Whitespace(_))
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, SqlToken::Keyword(k) if k == keyword)
    }

    fn is_symbol(&self, symbol: &str) -> bool {
        matches!(self, SqlToken::Symbol(s) if s == symbol)
    }
}

pub struct SqlSanitizer {
    columns: ColumnMap,
}

impl SqlSanitizer {
    pub fn new(columns: ColumnMap) -> Self {
        Self { columns }
    }

    /// Reduce generator output to one safe SELECT ending in a single `;`
    pub fn sanitize(&self, raw: &str) -> Result<String> {
        let candidate = extract_candidate(raw);
        let candidate = LABEL_RE.replace(&candidate, "");
        if candidate.trim().is_empty() {
            return Err(HealerError::UnsafeQuery("empty statement".to_string()));
        }

        let lexed = Tokenizer::new(&GenericDialect {}, &candidate)
            .tokenize()
            .map_err(|e| HealerError::UnsafeQuery(format!("could not tokenize statement: {}", e)))?;

        let statement = single_statement(lexed)?;
        ensure_select(&statement)?;

        let mut tokens = self.classify(&statement)?;
        strip_row_limits(&mut tokens);

        let sql = render(&tokens);
        debug!(sql = %sql, "Sanitized statement");
        Ok(sql)
    }

    fn classify(&self, statement: &[Token]) -> Result<Vec<SqlToken>> {
        let mut out = Vec::with_capacity(statement.len());

        for (i, token) in statement.iter().enumerate() {
            let classified = match token {
                Token::Word(word) => {
                    let prev = significant_before(statement, i);
                    let next = significant_after(statement, i);
                    self.classify_word(word, prev, next)?
                }
                Token::Mul => match out.iter().rev().find(|t: &&SqlToken| !t.is_whitespace()) {
                    None => SqlToken::Wildcard,
                    Some(prev) if prev.is_keyword("SELECT") || prev.is_keyword("DISTINCT") => {
                        SqlToken::Wildcard
                    }
                    Some(prev)
                        if prev.is_symbol(",") || prev.is_symbol(".") || prev.is_symbol("(") =>
                    {
                        SqlToken::Wildcard
                    }
                    Some(_) => SqlToken::Symbol("*".to_string()),
                },
                Token::SingleQuotedString(s) => {
                    SqlToken::Literal(format!("'{}'", s.replace('\'', "''")))
                }
                Token::Number(_, _) => SqlToken::Literal(token.to_string()),
                Token::Whitespace(Whitespace::SingleLineComment { .. }) => {
                    SqlToken::Whitespace("\n".to_string())
                }
                Token::Whitespace(Whitespace::MultiLineComment(_)) => {
                    SqlToken::Whitespace(" ".to_string())
                }
                Token::Whitespace(ws) => SqlToken::Whitespace(ws.to_string()),
                Token::EOF => continue,
                other => SqlToken::Symbol(other.to_string()),
            };
            out.push(classified);
        }

        Ok(out)
    }

    fn classify_word(
        &self,
        word: &Word,
        prev: Option<&Token>,
        next: Option<&Token>,
    ) -> Result<SqlToken> {
        // Any spelling called as a function: bare, quoted or schema-qualified
        let upper = word.value.to_uppercase();
        if matches!(next, Some(Token::LParen)) && DENIED_FUNCTIONS.contains(upper.as_str()) {
            return Err(HealerError::UnsafeQuery(format!(
                "statement calls denied function {}",
                word.value
            )));
        }

        // Quoted names are identifiers whatever they spell
        if word.quote_style.is_some() {
            let name = self.columns.lookup(&word.value).unwrap_or(&word.value);
            return Ok(SqlToken::Identifier(name.to_string()));
        }

        if FORBIDDEN_WORDS.contains(upper.as_str()) {
            return Err(HealerError::UnsafeQuery(format!(
                "statement contains forbidden keyword {}",
                upper
            )));
        }

        if let Some(canonical) = self.columns.lookup(&word.value) {
            return Ok(SqlToken::Identifier(canonical.to_string()));
        }

        match (prev, next) {
            (Some(Token::DoubleColon), _) => Ok(SqlToken::TypeName(word.value.clone())),
            (Some(Token::Period), _) => Ok(SqlToken::Identifier(word.value.clone())),
            _ if KEYWORDS.contains(upper.as_str()) => Ok(SqlToken::Keyword(upper)),
            (_, Some(Token::LParen)) => Ok(SqlToken::Function(word.value.clone())),
            _ => Ok(SqlToken::Identifier(word.value.clone())),
        }
    }
}

impl Default for SqlSanitizer {
    fn default() -> Self {
        Self::new(ColumnMap::default())
    }
}

/// First fenced block if present, otherwise the whole output without stray fences
fn extract_candidate(raw: &str) -> String {
    if let Some(block) = FENCED_BLOCK_RE.captures(raw) {
        return block[1].trim().to_string();
    }
    let text = OPEN_FENCE_RE.replace(raw, "");
    text.trim().trim_end_matches("```").trim().to_string()
}

/// Tokens of the only statement, without its terminator.
fn single_statement(tokens: Vec<Token>) -> Result<Vec<Token>> {
    let mut statement = Vec::with_capacity(tokens.len());
    let mut terminated = false;

    for token in tokens {
        if terminated {
            if is_trivia(&token) || token == Token::SemiColon {
                continue;
            }
            return Err(HealerError::UnsafeQuery(
                "more than one statement in output".to_string(),
            ));
        }
        if token == Token::SemiColon {
            terminated = true;
            continue;
        }
        statement.push(token);
    }

    Ok(statement)
}

fn ensure_select(statement: &[Token]) -> Result<()> {
    match statement.iter().find(|t| !is_trivia(t)) {
        Some(Token::Word(word))
            if word.quote_style.is_none() && word.value.eq_ignore_ascii_case("SELECT") =>
        {
            Ok(())
        }
        Some(other) => Err(HealerError::UnsafeQuery(format!(
            "only SELECT statements are allowed, found '{}'",
            other
        ))),
        None => Err(HealerError::UnsafeQuery("empty statement".to_string())),
    }
}

fn is_trivia(token: &Token) -> bool {
    matches!(token, Token::Whitespace(_) | Token::EOF)
}

fn significant_before(tokens: &[Token], index: usize) -> Option<&Token> {
    tokens[..index].iter().rev().find(|t| !is_trivia(t))
}

fn significant_after(tokens: &[Token], index: usize) -> Option<&Token> {
    tokens[index + 1..].iter().find(|t| !is_trivia(t))
}

/// Words that can continue a row-limit clause after its leading keyword
const LIMIT_CLAUSE_WORDS: &[&str] = &["ALL"];
const FETCH_CLAUSE_WORDS: &[&str] = &["FIRST", "NEXT", "ROW", "ROWS", "ONLY", "WITH", "TIES"];

fn row_limit_clause(token: &SqlToken) -> Option<&'static [&'static str]> {
    if token.is_keyword("LIMIT") {
        Some(LIMIT_CLAUSE_WORDS)
    } else if token.is_keyword("FETCH") {
        Some(FETCH_CLAUSE_WORDS)
    } else {
        None
    }
}

/// Index of the last token of the clause starting at `start`. The clause runs
/// to the next keyword outside its own words, an unmatched `)` or the end.
fn clause_end(tokens: &[SqlToken], start: usize, clause_words: &[&str]) -> usize {
    let mut depth = 0usize;
    let mut end = start;

    for (j, token) in tokens.iter().enumerate().skip(start + 1) {
        match token {
            SqlToken::Whitespace(_) => continue,
            SqlToken::Symbol(s) if s == "(" => depth += 1,
            SqlToken::Symbol(s) if s == ")" => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            SqlToken::Keyword(k) if depth == 0 && !clause_words.contains(&k.as_str()) => break,
            _ => {}
        }
        end = j;
    }

    end
}

/// Remove every outer `LIMIT ...` or `FETCH ...` clause; row limits inside
/// parentheses stay.
fn strip_row_limits(tokens: &mut Vec<SqlToken>) {
    let mut depth = 0usize;
    let mut i = 0;

    while i < tokens.len() {
        if tokens[i].is_symbol("(") {
            depth += 1;
        } else if tokens[i].is_symbol(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 {
            if let Some(clause_words) = row_limit_clause(&tokens[i]) {
                let end = clause_end(tokens, i, clause_words);
                let mut start = i;
                while start > 0 && tokens[start - 1].is_whitespace() {
                    start -= 1;
                }
                tokens.drain(start..=end);
                i = start;
                continue;
            }
        }
        i += 1;
    }
}

fn render(tokens: &[SqlToken]) -> String {
    let body: String = tokens.iter().map(SqlToken::render).collect();
    let body = body.trim().trim_end_matches(';').trim_end();
    format!("{};", body)
}
