//! Schema Document Parser
//!
//! Reads the box-drawn schema document into a `SchemaModel`.
//!
//! Table blocks are handled by a line-oriented state machine
//! (outside table → table header → table body). Relationships, enums,
//! example queries, rules and index hints are scanned over the whole text.

use crate::error::{HealerError, Result};
use crate::schema::model::{
    ColumnDefinition, EnumDefinition, ExampleQuery, ForeignKeyRelation, IndexHint, SchemaModel,
    TableDefinition, ValidationRule,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

const CELL_DELIMITER: char = '│';
const BLOCK_OPEN: char = '┌';
const BLOCK_CLOSE: char = '└';

lazy_static! {
    static ref RELATION_RE: Regex =
        Regex::new(r"(\w+)\.(\w+)\s*→\s*(\w+)\.(\w+)").expect("relation pattern");
    static ref ENUM_RE: Regex = Regex::new(r"enum\s+(\w+)\s*\{([^}]*)\}").expect("enum pattern");
    static ref QUOTED_RE: Regex = Regex::new(r#""([^"]*)""#).expect("quoted value pattern");
    static ref SQL_FENCE_RE: Regex =
        Regex::new(r"(?s)```sql[ \t]*\r?\n(.*?)\r?\n```").expect("sql fence pattern");
    static ref RULE_RE: Regex = Regex::new(r"(?m)^###[ \t]+(.+?)[ \t]*\r?\n-[ \t]+(.+?)[ \t]*\r?$")
        .expect("rule pattern");
    static ref INDEX_RE: Regex =
        Regex::new(r"(?m)^\s*-\s+`(\w+)`\s+-\s+(.+?)\s*$").expect("index pattern");
}

/// Raw schema document text
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    text: String,
}

impl SchemaDocument {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self { text })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parse(&self) -> Result<SchemaModel> {
        SchemaDocumentParser::new().parse(&self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    OutsideTable,
    InTableHeader,
    InTableBody,
}

pub struct SchemaDocumentParser;

impl SchemaDocumentParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a schema document. Fails if no table block is recognized.
    pub fn parse(&self, text: &str) -> Result<SchemaModel> {
        let tables = self.parse_tables(text);
        if tables.is_empty() {
            return Err(HealerError::Parse(
                "no table blocks found in schema document".to_string(),
            ));
        }

        let indexes = self.parse_indexes(text, &tables);
        let model = SchemaModel::new(
            tables,
            self.parse_relations(text),
            self.parse_enums(text),
            indexes,
            self.parse_examples(text),
            self.parse_rules(text),
        );

        debug!(
            tables = model.tables().len(),
            relations = model.relations().len(),
            enums = model.enums().len(),
            examples = model.examples().len(),
            rules = model.rules().len(),
            "Parsed schema document"
        );
        Ok(model)
    }

    fn parse_tables(&self, text: &str) -> Vec<TableDefinition> {
        let mut tables: Vec<TableDefinition> = Vec::new();
        let mut state = BlockState::OutsideTable;
        let mut current: Option<TableDefinition> = None;

        for (line_no, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            match state {
                BlockState::OutsideTable => {
                    if trimmed.starts_with(BLOCK_OPEN) {
                        state = BlockState::InTableHeader;
                    }
                }
                BlockState::InTableHeader => {
                    if trimmed.starts_with(BLOCK_CLOSE) {
                        debug!(line = line_no + 1, "Skipping table block without a name row");
                        state = BlockState::OutsideTable;
                    } else if trimmed.contains(CELL_DELIMITER) {
                        match table_name(trimmed) {
                            Some(name) => {
                                current = Some(TableDefinition {
                                    name,
                                    columns: Vec::new(),
                                });
                                state = BlockState::InTableBody;
                            }
                            None => {
                                debug!(
                                    line = line_no + 1,
                                    "Skipping table block with unusable name row"
                                );
                                state = BlockState::OutsideTable;
                            }
                        }
                    }
                }
                BlockState::InTableBody => {
                    if trimmed.starts_with(BLOCK_CLOSE) {
                        if let Some(table) = current.take() {
                            insert_table(&mut tables, table);
                        }
                        state = BlockState::OutsideTable;
                    } else if trimmed.contains(CELL_DELIMITER) {
                        if let (Some(table), Some(column)) =
                            (current.as_mut(), parse_column(trimmed))
                        {
                            insert_column(table, column);
                        }
                    }
                }
            }
        }

        if let Some(table) = current {
            warn!(table = %table.name, "Dropping unterminated table block");
        }

        tables
    }

    fn parse_relations(&self, text: &str) -> Vec<ForeignKeyRelation> {
        RELATION_RE
            .captures_iter(text)
            .map(|c| ForeignKeyRelation {
                source_table: c[1].to_string(),
                source_column: c[2].to_string(),
                target_table: c[3].to_string(),
                target_column: c[4].to_string(),
            })
            .collect()
    }

    fn parse_enums(&self, text: &str) -> Vec<EnumDefinition> {
        ENUM_RE
            .captures_iter(text)
            .map(|c| {
                let mut values = Vec::new();
                for line in c[2].lines().map(str::trim).filter(|l| !l.is_empty()) {
                    let quoted: Vec<String> = QUOTED_RE
                        .captures_iter(line)
                        .map(|q| q[1].to_string())
                        .collect();
                    if quoted.is_empty() {
                        let bare = line.trim_matches(|ch| ch == ',' || ch == '"');
                        values.push(bare.trim().to_string());
                    } else {
                        values.extend(quoted);
                    }
                }
                EnumDefinition {
                    name: c[1].to_string(),
                    values,
                }
            })
            .collect()
    }

    fn parse_examples(&self, text: &str) -> Vec<ExampleQuery> {
        SQL_FENCE_RE
            .captures_iter(text)
            .map(|c| ExampleQuery {
                sql: c[1].trim().to_string(),
            })
            .filter(|e| !e.sql.is_empty())
            .collect()
    }

    fn parse_rules(&self, text: &str) -> Vec<ValidationRule> {
        RULE_RE
            .captures_iter(text)
            .map(|c| ValidationRule {
                heading: c[1].to_string(),
                detail: c[2].to_string(),
            })
            .collect()
    }

    /// Index hints attach to every table declaring the named column.
    fn parse_indexes(&self, text: &str, tables: &[TableDefinition]) -> Vec<IndexHint> {
        let mut hints = Vec::new();
        for c in INDEX_RE.captures_iter(text) {
            for table in tables.iter().filter(|t| t.column(&c[1]).is_some()) {
                hints.push(IndexHint {
                    table: table.name.clone(),
                    column: c[1].to_string(),
                    reason: c[2].to_string(),
                });
            }
        }
        hints
    }
}

impl Default for SchemaDocumentParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Cells between the outer `│` borders, trimmed
fn split_cells(line: &str) -> Vec<&str> {
    let parts: Vec<&str> = line.split(CELL_DELIMITER).collect();
    if parts.len() < 3 {
        return parts.iter().map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
    }
    parts[1..parts.len() - 1].iter().map(|p| p.trim()).collect()
}

fn table_name(line: &str) -> Option<String> {
    let name = split_cells(line).into_iter().find(|c| !c.is_empty())?;
    let valid = name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if valid {
        Some(name.to_lowercase())
    } else {
        None
    }
}

fn is_marker(word: &str) -> Option<&'static str> {
    match word.trim_matches(|ch| ch == '(' || ch == ')' || ch == '[' || ch == ']' || ch == ',') {
        "PK" => Some("PK"),
        "FK" => Some("FK"),
        _ => None,
    }
}

fn parse_column(line: &str) -> Option<ColumnDefinition> {
    let cells = split_cells(line);
    let first = *cells.first()?;

    // Row counters and blank rows carry no column
    let filled: Vec<&str> = cells.iter().copied().filter(|c| !c.is_empty()).collect();
    if first.is_empty() || (filled.len() == 1 && first.chars().all(|ch| ch.is_ascii_digit())) {
        return None;
    }

    let mut primary_key = false;
    let mut foreign_key = false;
    let mut name_words = Vec::new();
    for word in first.split_whitespace() {
        match is_marker(word) {
            Some("PK") => primary_key = true,
            Some(_) => foreign_key = true,
            None => name_words.push(word),
        }
    }
    if name_words.is_empty() {
        return None;
    }

    let descriptor = cells.get(1).copied().unwrap_or("");
    let mut words = descriptor.split_whitespace();
    let data_type = words.next().unwrap_or("").to_string();
    let remainder: Vec<&str> = words.collect();
    for word in &remainder {
        match is_marker(word) {
            Some("PK") => primary_key = true,
            Some(_) => foreign_key = true,
            None => {}
        }
    }
    let remainder = remainder.join(" ").to_uppercase();

    Some(ColumnDefinition {
        name: name_words.join(" "),
        data_type,
        primary_key,
        foreign_key,
        not_null: remainder.contains("NOT NULL"),
        has_default: remainder.contains("DEFAULT"),
    })
}

/// Duplicate table names: last definition wins, first position is kept.
fn insert_table(tables: &mut Vec<TableDefinition>, table: TableDefinition) {
    match tables.iter_mut().find(|t| t.name == table.name) {
        Some(existing) => {
            warn!(
                table = %table.name,
                "Duplicate table in schema document, keeping the last definition"
            );
            *existing = table;
        }
        None => tables.push(table),
    }
}

fn insert_column(table: &mut TableDefinition, column: ColumnDefinition) {
    match table.columns.iter_mut().find(|c| c.name == column.name) {
        Some(existing) => {
            warn!(
                table = %table.name,
                column = %column.name,
                "Duplicate column, keeping the last definition"
            );
            *existing = column;
        }
        None => table.columns.push(column),
    }
}
