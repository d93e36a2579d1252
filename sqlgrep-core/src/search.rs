//! Column search.
//!
//! [`search_column`] queries one column; [`search_columns`] walks every
//! discovered column in order, reporting matches and progress to a
//! [`SearchSink`] as it goes. Output already handed to the sink stays valid
//! if a later column fails.

use crate::escape::LikePattern;
use crate::models::{
    ColumnDescriptor, MatchResult, SearchProgress, SearchSummary, truncate_for_display,
};
use crate::progress::ProgressReporter;
use crate::query::{self, Statement};
use crate::session::Session;
use crate::Result;
use std::time::Instant;

/// Default cap on matches shown per column.
pub const DEFAULT_MAX_RESULTS: u32 = 5;

/// Per-run search settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Matches shown per column before "more available"
    pub max_results_per_column: u32,
    /// Emit diagnostics (query text, row counts, timings) to the sink
    pub verbose: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results_per_column: DEFAULT_MAX_RESULTS,
            verbose: false,
        }
    }
}

impl SearchOptions {
    /// Builder method to set the per-column cap.
    #[must_use]
    pub const fn with_max_results(mut self, max_results_per_column: u32) -> Self {
        self.max_results_per_column = max_results_per_column;
        self
    }

    /// Builder method to toggle diagnostics.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Receives the events of a scan.
pub trait SearchSink {
    /// The column list is known and searching is about to start.
    ///
    /// # Errors
    /// Returns an error if the output cannot be written.
    fn scan_started(&mut self, column_count: usize, search_text: &str) -> Result<()>;

    /// A column produced at least one match.
    ///
    /// # Errors
    /// Returns an error if the output cannot be written.
    fn column_matched(&mut self, result: &MatchResult) -> Result<()>;

    /// A progress update is due.
    ///
    /// # Errors
    /// Returns an error if the output cannot be written.
    fn progress(&mut self, progress: &SearchProgress) -> Result<()>;

    /// A diagnostic line; only sent when [`SearchOptions::verbose`] is set.
    ///
    /// # Errors
    /// Returns an error if the output cannot be written.
    fn diagnostic(&mut self, message: &str) -> Result<()>;

    /// Every column has been searched.
    ///
    /// # Errors
    /// Returns an error if the output cannot be written.
    fn finished(&mut self, summary: &SearchSummary) -> Result<()>;
}

/// Searches one column for `pattern`, returning at most `max_results` values.
///
/// One row beyond the cap is requested; when it arrives the result is cut
/// back to `max_results` and flagged as truncated. Each value is shortened
/// to the display length independently.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn search_column<S>(
    session: &mut S,
    column: &ColumnDescriptor,
    pattern: &LikePattern,
    max_results: u32,
) -> Result<MatchResult>
where
    S: Session + ?Sized,
{
    let statement = search_statement(&*session, column, pattern, max_results);
    run_search(session, column, &statement, max_results).await
}

fn search_statement<S>(
    session: &S,
    column: &ColumnDescriptor,
    pattern: &LikePattern,
    max_results: u32,
) -> Statement
where
    S: Session + ?Sized,
{
    query::column_search(
        &column.schema,
        &column.table,
        &column.column,
        pattern,
        max_results,
        session.param_style(),
    )
}

async fn run_search<S>(
    session: &mut S,
    column: &ColumnDescriptor,
    statement: &Statement,
    max_results: u32,
) -> Result<MatchResult>
where
    S: Session + ?Sized,
{
    let rows = session.query(statement).await?;
    Ok(match_result(column, rows, max_results))
}

fn match_result(
    column: &ColumnDescriptor,
    rows: Vec<crate::session::Row>,
    max_results: u32,
) -> MatchResult {
    let cap = usize::try_from(max_results).unwrap_or(usize::MAX);
    let mut matches: Vec<String> = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .next()
                .flatten()
                .map(|value| truncate_for_display(&value))
                .unwrap_or_default()
        })
        .collect();
    let truncated = matches.len() > cap;
    matches.truncate(cap);
    MatchResult {
        column: column.clone(),
        truncated,
        matches,
    }
}

/// Searches every column in order and reports to `sink`.
///
/// `search_text` is escaped once for the whole run. Columns are processed
/// strictly in the given order; the first failure aborts the scan.
///
/// # Errors
/// Returns the first query or sink failure.
pub async fn search_columns<S, K>(
    session: &mut S,
    columns: &[ColumnDescriptor],
    search_text: &str,
    options: SearchOptions,
    sink: &mut K,
) -> Result<SearchSummary>
where
    S: Session + ?Sized,
    K: SearchSink + ?Sized,
{
    let pattern = LikePattern::contains(search_text);
    let total_rows = columns
        .iter()
        .fold(0u64, |total, column| total.saturating_add(column.row_count));

    sink.scan_started(columns.len(), search_text)?;
    if options.verbose {
        sink.diagnostic(&format!("Total rows to search: {total_rows}"))?;
    }

    let started = Instant::now();
    let mut reporter = ProgressReporter::new(total_rows, started);
    let mut columns_with_matches = 0usize;

    for column in columns {
        let max_results = options.max_results_per_column;
        let statement = search_statement(&*session, column, &pattern, max_results);
        if options.verbose {
            sink.diagnostic(&format!("Executing: {statement}"))?;
        }

        let result = run_search(session, column, &statement, max_results).await?;
        let matched = result.has_matches();
        if matched {
            columns_with_matches = columns_with_matches.saturating_add(1);
            sink.column_matched(&result)?;
        }

        if let Some(progress) = reporter.column_done(column.row_count, matched, Instant::now()) {
            sink.progress(&progress)?;
        }
    }

    let summary = SearchSummary {
        columns_searched: columns.len(),
        columns_with_matches,
        total_rows,
        elapsed: started.elapsed(),
    };
    if options.verbose {
        sink.diagnostic(&format!(
            "Searched {} rows in {:.1?}",
            summary.total_rows, summary.elapsed
        ))?;
    }
    sink.finished(&summary)?;
    Ok(summary)
}
