//! Data carried through a scan.
//!
//! Columns are discovered once, matches are produced per column and handed
//! straight to the output sink. Nothing here is persisted.

use std::time::Duration;

/// Longest value shown for a single match, in characters.
pub const MAX_DISPLAY_CHARS: usize = 500;

/// Appended to values cut at [`MAX_DISPLAY_CHARS`].
pub const TRUNCATION_MARKER: &str = "... <truncated>";

/// A text column in a base table, with the row count of its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Owning schema
    pub schema: String,
    /// Owning table
    pub table: String,
    /// Column name
    pub column: String,
    /// Rows in the owning table
    pub row_count: u64,
}

impl ColumnDescriptor {
    /// Creates a descriptor whose row count has not been resolved yet.
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
            row_count: 0,
        }
    }

    /// `table.column`, as shown in match headers.
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// Matches found in one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// The column that was searched
    pub column: ColumnDescriptor,
    /// More rows matched than were returned
    pub truncated: bool,
    /// Matching values, each cut to the display length
    pub matches: Vec<String>,
}

impl MatchResult {
    /// True when the column produced at least one match.
    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Completion estimate for a running scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchProgress {
    /// Whole percent of rows processed
    pub percent_complete: u64,
    /// Estimated time left, present once the estimate is stable
    pub eta: Option<Duration>,
}

/// Totals for a finished scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSummary {
    /// Number of columns queried
    pub columns_searched: usize,
    /// Number of columns with one or more matches
    pub columns_with_matches: usize,
    /// Rows across every searched column
    pub total_rows: u64,
    /// Wall-clock time of the search phase
    pub elapsed: Duration,
}

/// Cuts `value` to [`MAX_DISPLAY_CHARS`] characters, appending the marker when shortened.
///
/// ```rust
/// use sqlgrep_core::models::{truncate_for_display, TRUNCATION_MARKER};
///
/// let long = "x".repeat(501);
/// let shown = truncate_for_display(&long);
/// assert!(shown.ends_with(TRUNCATION_MARKER));
/// assert_eq!(truncate_for_display("short"), "short");
/// ```
pub fn truncate_for_display(value: &str) -> String {
    match value.char_indices().nth(MAX_DISPLAY_CHARS) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &value[..cut]),
        None => value.to_string(),
    }
}
