//! Structured logging setup for the sqlgrep binary.
//!
//! Logs go to stderr; stdout carries the search results.

use crate::Result;
use tracing_subscriber::EnvFilter;

/// Filter directives used when `RUST_LOG` is unset.
///
/// Verbose mode only raises the sqlgrep crates to DEBUG; database and
/// runtime crates stay at WARN.
pub const fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,sqlgrep=debug,sqlgrep_core=debug"
    } else {
        "warn"
    }
}

/// Initializes the global subscriber.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
///
/// # Example
/// ```rust,no_run
/// use sqlgrep_core::logging::init_logging;
///
/// init_logging(true).expect("Failed to initialize logging");
/// ```
///
/// # Errors
/// Returns a configuration error if a subscriber is already installed.
pub fn init_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| {
            crate::error::SqlGrepError::configuration(format!(
                "Failed to initialize logging: {e}"
            ))
        })?;

    Ok(())
}
