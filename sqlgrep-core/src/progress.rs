//! Progress and time-remaining estimates.

use crate::models::SearchProgress;
use std::time::{Duration, Instant};

/// Estimates are hidden until more than this share of rows is done.
pub const ETA_MIN_PERCENT: u64 = 10;

/// Minimum quiet period between progress lines for columns without matches.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(2);

impl SearchProgress {
    /// Computes progress from row totals and elapsed time.
    ///
    /// The estimate extrapolates linearly from whole elapsed seconds. It is
    /// omitted until at least one row is done and more than
    /// [`ETA_MIN_PERCENT`] percent is complete. A scan over zero rows is
    /// reported as complete.
    pub fn compute(total_rows: u64, completed_rows: u64, elapsed: Duration) -> Self {
        if total_rows == 0 {
            return Self {
                percent_complete: 100,
                eta: None,
            };
        }

        let total = u128::from(total_rows);
        let completed = u128::from(completed_rows);
        let percent_complete = saturate(completed.saturating_mul(100) / total);

        let eta = if completed_rows > 0 && percent_complete > ETA_MIN_PERCENT {
            let seconds = u128::from(elapsed.as_secs());
            let estimated_total = seconds.saturating_mul(total) / completed;
            Some(Duration::from_secs(saturate(
                estimated_total.saturating_sub(seconds),
            )))
        } else {
            None
        };

        Self {
            percent_complete,
            eta,
        }
    }
}

fn saturate(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Tracks rows processed and decides when a progress line is due.
#[derive(Debug)]
pub struct ProgressReporter {
    total_rows: u64,
    completed_rows: u64,
    started: Instant,
    last_reported: Instant,
}

impl ProgressReporter {
    /// Starts tracking a scan over `total_rows` rows.
    pub fn new(total_rows: u64, started: Instant) -> Self {
        Self {
            total_rows,
            completed_rows: 0,
            started,
            last_reported: started,
        }
    }

    /// Records a finished column.
    ///
    /// Returns the progress to display when the column matched or more than
    /// [`REPORT_INTERVAL`] has passed since the last report.
    pub fn column_done(&mut self, rows: u64, matched: bool, now: Instant) -> Option<SearchProgress> {
        self.completed_rows = self.completed_rows.saturating_add(rows);
        let quiet_for = now.saturating_duration_since(self.last_reported);
        if !matched && quiet_for <= REPORT_INTERVAL {
            return None;
        }
        self.last_reported = now;
        Some(SearchProgress::compute(
            self.total_rows,
            self.completed_rows,
            now.saturating_duration_since(self.started),
        ))
    }

    /// Rows processed so far.
    pub const fn completed_rows(&self) -> u64 {
        self.completed_rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_done() {
        let progress = SearchProgress::compute(1000, 250, Duration::from_secs(10));
        assert_eq!(progress.percent_complete, 25);
        assert_eq!(progress.eta, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_eta_hidden_until_past_ten_percent() {
        let progress = SearchProgress::compute(1000, 100, Duration::from_secs(10));
        assert_eq!(progress.percent_complete, 10);
        assert_eq!(progress.eta, None);

        let progress = SearchProgress::compute(1000, 110, Duration::from_secs(10));
        assert_eq!(progress.percent_complete, 11);
        assert!(progress.eta.is_some());
    }

    #[test]
    fn test_no_rows_done_has_no_eta() {
        let progress = SearchProgress::compute(1000, 0, Duration::from_secs(10));
        assert_eq!(progress.percent_complete, 0);
        assert_eq!(progress.eta, None);
    }

    #[test]
    fn test_empty_database_is_complete() {
        let progress = SearchProgress::compute(0, 0, Duration::from_secs(1));
        assert_eq!(progress.percent_complete, 100);
        assert_eq!(progress.eta, None);
    }

    #[test]
    fn test_percent_is_floored() {
        let progress = SearchProgress::compute(3, 2, Duration::ZERO);
        assert_eq!(progress.percent_complete, 66);
        assert_eq!(progress.eta, Some(Duration::ZERO));
    }

    #[test]
    fn test_huge_counts_do_not_overflow() {
        let progress = SearchProgress::compute(u64::MAX, u64::MAX / 2, Duration::from_secs(u64::MAX / 4));
        assert_eq!(progress.percent_complete, 49);
        assert!(progress.eta.is_some());
    }

    #[test]
    fn test_reporter_throttles_quiet_columns() {
        let start = Instant::now();
        let mut reporter = ProgressReporter::new(100, start);

        assert_eq!(reporter.column_done(10, false, start + Duration::from_secs(1)), None);
        assert_eq!(reporter.column_done(10, false, start + Duration::from_secs(2)), None);

        let due = reporter.column_done(10, false, start + Duration::from_millis(2001));
        assert_eq!(due.map(|p| p.percent_complete), Some(30));

        // Interval restarts after a report
        assert_eq!(reporter.column_done(10, false, start + Duration::from_secs(3)), None);
        assert_eq!(reporter.completed_rows(), 40);
    }

    #[test]
    fn test_reporter_always_reports_matches() {
        let start = Instant::now();
        let mut reporter = ProgressReporter::new(100, start);
        let due = reporter.column_done(50, true, start);
        assert_eq!(due.map(|p| p.percent_complete), Some(50));
    }
}
