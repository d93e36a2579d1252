//! In-memory database used by the integration tests.
//!
//! Answers exactly the statements the query builder produces and records
//! every statement it receives.

#![allow(dead_code)]

use async_trait::async_trait;
use sqlgrep_core::escape::LIKE_ESCAPE_CHAR;
use sqlgrep_core::models::{ColumnDescriptor, MatchResult, SearchProgress, SearchSummary};
use sqlgrep_core::query::{self, ParamStyle, Statement};
use sqlgrep_core::{DatabaseDiagnostic, Result, Row, SearchSink, Session, SqlGrepError};

/// Declared type of an in-memory column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Char,
    VarChar,
    NChar,
    NVarChar,
    Int,
    DateTime,
}

impl ColumnType {
    fn is_string(self) -> bool {
        matches!(self, Self::Char | Self::VarChar | Self::NChar | Self::NVarChar)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub schema: String,
    pub name: String,
    pub is_view: bool,
    pub columns: Vec<(String, ColumnType)>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl MemoryTable {
    pub fn new(schema: &str, name: &str, columns: &[(&str, ColumnType)]) -> Self {
        Self {
            schema: schema.to_string(),
            name: name.to_string(),
            is_view: false,
            columns: columns
                .iter()
                .map(|(name, kind)| ((*name).to_string(), *kind))
                .collect(),
            rows: Vec::new(),
        }
    }

    pub fn view(mut self) -> Self {
        self.is_view = true;
        self
    }

    pub fn row(mut self, values: &[Option<&str>]) -> Self {
        self.rows
            .push(values.iter().map(|v| v.map(str::to_string)).collect());
        self
    }
}

/// Session over a fixed set of tables.
pub struct MemorySession {
    pub tables: Vec<MemoryTable>,
    pub max_results: u32,
    pub style: ParamStyle,
    pub executed: Vec<Statement>,
    /// Fail any statement whose text contains this marker
    pub fail_on: Option<(String, DatabaseDiagnostic)>,
}

impl MemorySession {
    pub fn new(tables: Vec<MemoryTable>, max_results: u32) -> Self {
        Self {
            tables,
            max_results,
            style: ParamStyle::Numbered,
            executed: Vec::new(),
            fail_on: None,
        }
    }

    pub fn failing_on(mut self, marker: &str, diagnostic: DatabaseDiagnostic) -> Self {
        self.fail_on = Some((marker.to_string(), diagnostic));
        self
    }

    pub fn count_statements(&self) -> usize {
        self.executed
            .iter()
            .filter(|s| s.sql.starts_with("select count_big(*)"))
            .count()
    }

    pub fn search_statements(&self) -> usize {
        self.executed
            .iter()
            .filter(|s| s.sql.starts_with("select top"))
            .count()
    }

    fn catalog_rows(&self) -> Vec<Row> {
        let mut rows: Vec<Row> = self
            .tables
            .iter()
            .filter(|table| !table.is_view)
            .flat_map(|table| {
                table
                    .columns
                    .iter()
                    .filter(|(_, kind)| kind.is_string())
                    .map(|(column, _)| {
                        vec![
                            Some(table.schema.clone()),
                            Some(table.name.clone()),
                            Some(column.clone()),
                        ]
                    })
            })
            .collect();
        rows.sort();
        rows
    }

    fn search_rows(&self, statement: &Statement) -> Option<Vec<Row>> {
        for table in &self.tables {
            for (index, (column, _)) in table.columns.iter().enumerate() {
                let pattern = sqlgrep_core::escape::LikePattern::contains("");
                let expected = query::column_search(
                    &table.schema,
                    &table.name,
                    column,
                    &pattern,
                    self.max_results,
                    self.style,
                );
                if expected.sql != statement.sql {
                    continue;
                }
                let fetch = usize::try_from(self.max_results).unwrap_or(usize::MAX) + 1;
                let needle = like_needle(statement.params.first()?);
                let rows = table
                    .rows
                    .iter()
                    .filter_map(|row| row.get(index).cloned().flatten())
                    .filter(|value| value.contains(&needle))
                    .take(fetch)
                    .map(|value| vec![Some(value.chars().take(501).collect())])
                    .collect();
                return Some(rows);
            }
        }
        None
    }

    fn count_rows(&self, statement: &Statement) -> Option<Vec<Row>> {
        self.tables
            .iter()
            .find(|table| query::row_count(&table.schema, &table.name).sql == statement.sql)
            .map(|table| vec![vec![Some(table.rows.len().to_string())]])
    }
}

/// Turns `%escaped%` back into the literal substring it matches.
fn like_needle(pattern: &str) -> String {
    let inner = pattern
        .strip_prefix('%')
        .and_then(|p| p.strip_suffix('%'))
        .unwrap_or(pattern);
    let mut needle = String::new();
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == LIKE_ESCAPE_CHAR {
            needle.extend(chars.next());
        } else {
            needle.push(ch);
        }
    }
    needle
}

#[async_trait]
impl Session for MemorySession {
    fn param_style(&self) -> ParamStyle {
        self.style
    }

    async fn query(&mut self, statement: &Statement) -> Result<Vec<Row>> {
        self.executed.push(statement.clone());

        if let Some((marker, diagnostic)) = &self.fail_on {
            if statement.sql.contains(marker.as_str()) {
                return Err(SqlGrepError::database("Query failed", diagnostic.clone()));
            }
        }

        if statement.sql == query::STRING_COLUMNS_QUERY {
            return Ok(self.catalog_rows());
        }
        if let Some(rows) = self.count_rows(statement) {
            return Ok(rows);
        }
        if let Some(rows) = self.search_rows(statement) {
            return Ok(rows);
        }
        Err(SqlGrepError::database(
            "Query failed",
            DatabaseDiagnostic::message(format!("unexpected statement: {}", statement.sql)),
        ))
    }

    fn describe(&self) -> String {
        "in-memory database".to_string()
    }
}

/// Everything a scan reported.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub started: Option<(usize, String)>,
    pub matches: Vec<MatchResult>,
    pub progress: Vec<SearchProgress>,
    pub diagnostics: Vec<String>,
    pub summary: Option<SearchSummary>,
}

impl SearchSink for RecordingSink {
    fn scan_started(&mut self, column_count: usize, search_text: &str) -> Result<()> {
        self.started = Some((column_count, search_text.to_string()));
        Ok(())
    }

    fn column_matched(&mut self, result: &MatchResult) -> Result<()> {
        self.matches.push(result.clone());
        Ok(())
    }

    fn progress(&mut self, progress: &SearchProgress) -> Result<()> {
        self.progress.push(*progress);
        Ok(())
    }

    fn diagnostic(&mut self, message: &str) -> Result<()> {
        self.diagnostics.push(message.to_string());
        Ok(())
    }

    fn finished(&mut self, summary: &SearchSummary) -> Result<()> {
        self.summary = Some(*summary);
        Ok(())
    }
}

pub fn column(schema: &str, table: &str, name: &str, rows: u64) -> ColumnDescriptor {
    ColumnDescriptor {
        row_count: rows,
        ..ColumnDescriptor::new(schema, table, name)
    }
}

pub fn people() -> MemoryTable {
    MemoryTable::new(
        "dbo",
        "People",
        &[("Name", ColumnType::VarChar), ("Email", ColumnType::VarChar)],
    )
    .row(&[Some("Alice Smith"), Some("asmith@example.com")])
}
