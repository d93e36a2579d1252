//! Console rendering of scan events.
//!
//! Every line starts by clearing the rest of the terminal line, since the
//! previous line may be a carriage-return terminated progress line. ANSI
//! sequences are only written when `ansi` is set.

use sqlgrep_core::models::{MatchResult, SearchProgress, SearchSummary};
use sqlgrep_core::{Result, SearchSink, SqlGrepError};
use std::io::Write;

const CLEAR_EOL: &str = "\x1b[0K";
const RESET: &str = "\x1b[0m";

/// Text styles used on the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Match header: bold red on white
    Header,
    /// Verbose diagnostics and "more available"
    Note,
    /// Fatal errors
    Error,
}

impl Style {
    const fn codes(self) -> &'static str {
        match self {
            Self::Header => "\x1b[31m\x1b[47m\x1b[1m",
            Self::Note => "\x1b[32m",
            Self::Error => "\x1b[31m",
        }
    }
}

/// Writes scan output to a terminal or any other writer.
pub struct Console<W: Write> {
    out: W,
    ansi: bool,
}

impl<W: Write> Console<W> {
    /// Wraps `out`; `ansi` enables colors and line clearing.
    pub const fn new(out: W, ansi: bool) -> Self {
        Self { out, ansi }
    }

    /// Consumes the console, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.out
            .write_all(text.as_bytes())
            .map_err(|e| SqlGrepError::io("Failed to write output", e))
    }

    fn clear_line(&mut self) -> Result<()> {
        if self.ansi {
            self.write(CLEAR_EOL)?;
        }
        Ok(())
    }

    /// Writes a plain line.
    ///
    /// # Errors
    /// Returns an error if the writer fails.
    pub fn line(&mut self, text: &str) -> Result<()> {
        self.clear_line()?;
        self.write(text)?;
        self.write("\n")
    }

    /// Writes a styled line.
    ///
    /// # Errors
    /// Returns an error if the writer fails.
    pub fn styled_line(&mut self, style: Style, text: &str) -> Result<()> {
        self.clear_line()?;
        if self.ansi {
            self.write(style.codes())?;
            self.write(text)?;
            self.write(RESET)?;
        } else {
            self.write(text)?;
        }
        self.write("\n")
    }

    /// Writes a fatal error line.
    ///
    /// # Errors
    /// Returns an error if the writer fails.
    pub fn error(&mut self, text: &str) -> Result<()> {
        self.styled_line(Style::Error, text)?;
        self.flush()
    }

    /// Flushes buffered output.
    ///
    /// # Errors
    /// Returns an error if the writer fails.
    pub fn flush(&mut self) -> Result<()> {
        self.out
            .flush()
            .map_err(|e| SqlGrepError::io("Failed to flush output", e))
    }
}

/// `NN% complete (S seconds remaining)...`
pub fn progress_text(progress: &SearchProgress) -> String {
    let mut text = format!("{}% complete", progress.percent_complete);
    if let Some(eta) = progress.eta {
        text.push_str(&format!(" ({} seconds remaining)...", eta.as_secs()));
    }
    text
}

impl<W: Write> SearchSink for Console<W> {
    fn scan_started(&mut self, column_count: usize, search_text: &str) -> Result<()> {
        self.line(&format!(
            "Searching {column_count} columns for '{search_text}'..."
        ))
    }

    fn column_matched(&mut self, result: &MatchResult) -> Result<()> {
        self.styled_line(Style::Header, &result.column.display_name())?;
        for value in &result.matches {
            self.line(&format!("    {value}"))?;
        }
        if result.truncated {
            self.styled_line(Style::Note, "    ... more available")?;
        }
        Ok(())
    }

    fn progress(&mut self, progress: &SearchProgress) -> Result<()> {
        self.clear_line()?;
        self.write(&progress_text(progress))?;
        self.write("\r")?;
        self.flush()
    }

    fn diagnostic(&mut self, message: &str) -> Result<()> {
        self.styled_line(Style::Note, message)
    }

    fn finished(&mut self, _summary: &SearchSummary) -> Result<()> {
        self.line("")?;
        self.flush()
    }
}
