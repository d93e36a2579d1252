//! sqlgrep: search every text column of a SQL Server database.
//!
//! The binary in `main.rs` parses arguments, sets up logging and calls
//! [`run`]. Everything is exposed here so the flow can be tested.

pub mod console;

use clap::Parser;
use console::Console;
use futures::FutureExt;
use sqlgrep_core::driver::{FALLBACK_DRIVER, installed_drivers};
use sqlgrep_core::error::redact_connection_string;
use sqlgrep_core::search::DEFAULT_MAX_RESULTS;
use sqlgrep_core::{
    ConnectionSettings, Credentials, SearchOptions, SearchSink, SearchSummary, Session,
    SqlGrepError, discover_string_columns, resolve_driver, search_columns, session,
};
use std::future::Future;
use std::io::Write;
use std::panic::AssertUnwindSafe;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "sqlgrep")]
#[command(about = "Search every text column of a SQL Server database for a string")]
#[command(version)]
#[command(long_about = "
sqlgrep - find a string anywhere in a SQL Server database

Every char, varchar, nchar and nvarchar column of every base table is
searched for the given text. Wildcard characters in the text match
literally.

Without --user-name/--password a trusted (integrated) connection is used.
Without --driver the newest installed SQL Server ODBC driver is chosen.

EXAMPLES:
  sqlgrep Sales 'Alice Smith'
  sqlgrep -s db01,1433 -u reader -p secret -m 20 Sales '50%'
")]
pub struct Cli {
    /// The database to search
    pub database: String,

    /// The text to search for
    #[arg(value_name = "SEARCH-STRING")]
    pub search_string: String,

    /// Verbose mode
    #[arg(short, long, help = "Show queries, row counts and timings")]
    pub verbose: bool,

    /// Matches shown per column
    #[arg(
        short,
        long = "max-results",
        default_value_t = DEFAULT_MAX_RESULTS,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Maximum number of matches to return per column"
    )]
    pub max_results: u32,

    /// Server to connect to
    #[arg(
        short,
        long,
        env = "SQLGREP_SERVER",
        default_value = sqlgrep_core::connection::DEFAULT_SERVER,
        help = "The SQL Server that has the database to search"
    )]
    pub server: String,

    /// ODBC driver name
    #[arg(
        short,
        long,
        env = "SQLGREP_DRIVER",
        help = "The ODBC driver to use (default: newest installed)"
    )]
    pub driver: Option<String>,

    /// SQL Server login
    #[arg(
        short,
        long = "user-name",
        env = "SQLGREP_USER",
        requires = "password",
        help = "SQL Server login (requires --password)"
    )]
    pub user_name: Option<String>,

    /// SQL Server password
    #[arg(
        short,
        long,
        env = "SQLGREP_PASSWORD",
        hide_env_values = true,
        requires = "user_name",
        help = "SQL Server password (requires --user-name)"
    )]
    pub password: Option<String>,

    /// Accept any server certificate
    #[arg(long, help = "Do not validate the server's TLS certificate")]
    pub trust_server_certificate: bool,
}

impl Cli {
    /// Search settings for this invocation.
    pub const fn search_options(&self) -> SearchOptions {
        SearchOptions {
            max_results_per_column: self.max_results,
            verbose: self.verbose,
        }
    }

    /// Connection settings for `driver`.
    pub fn connection_settings(&self, driver: String) -> ConnectionSettings {
        let settings = ConnectionSettings::new(driver, &self.server, &self.database)
            .with_trust_server_certificate(self.trust_server_certificate);
        match (&self.user_name, &self.password) {
            (Some(user), Some(password)) => {
                settings.with_credentials(Credentials::new(user.clone(), password.clone()))
            }
            _ => settings,
        }
    }
}

/// Chooses the driver: the one named on the command line, else the best installed.
///
/// When the compiled backend connects without a driver name (TDS), a missing
/// or unreadable driver registry falls back to the default name quietly.
///
/// # Errors
/// Returns [`SqlGrepError::DriverEnumeration`] if the installed drivers
/// cannot be listed and the compiled backend needs the driver name.
pub fn choose_driver(cli: &Cli) -> sqlgrep_core::Result<String> {
    if let Some(driver) = &cli.driver {
        return Ok(driver.clone());
    }

    let installed = installed_drivers();
    if session::USES_DRIVER_NAME {
        return resolve_driver(installed.as_ref(), || {
            tracing::warn!(
                "No SQL Server ODBC driver found; falling back to '{}'",
                FALLBACK_DRIVER
            );
        });
    }

    resolve_driver(installed.as_ref(), || {
        tracing::debug!("No SQL Server ODBC driver registered; using '{}'", FALLBACK_DRIVER);
    })
    .or_else(|e| {
        tracing::debug!("Ignoring driver lookup failure: {}", e);
        Ok(FALLBACK_DRIVER.to_string())
    })
}

async fn search_database<W, C, F>(
    cli: &Cli,
    console: &mut Console<W>,
    connect: C,
) -> sqlgrep_core::Result<SearchSummary>
where
    W: Write,
    C: FnOnce(ConnectionSettings) -> F,
    F: Future<Output = sqlgrep_core::Result<Box<dyn Session>>>,
{
    let driver = choose_driver(cli)?;
    let settings = cli.connection_settings(driver);
    if cli.verbose {
        console.diagnostic(&format!(
            "Connecting: {}",
            redact_connection_string(&settings.to_odbc_string())
        ))?;
    }

    let mut session = connect(settings).await?;
    tracing::info!("Connected to {}", session.describe());
    search_session(cli, session.as_mut(), console).await
}

/// Scans the schema behind `session` and searches every text column,
/// writing banners, matches and progress to `console`.
///
/// # Errors
/// Returns the first database or output failure.
pub async fn search_session<S, W>(
    cli: &Cli,
    session: &mut S,
    console: &mut Console<W>,
) -> sqlgrep_core::Result<SearchSummary>
where
    S: Session + ?Sized,
    W: Write,
{
    let options = cli.search_options();
    console.line("Scanning for string columns...")?;
    let columns = discover_string_columns(&mut *session).await?;
    if options.verbose {
        for column in &columns {
            console.diagnostic(&format!(
                "{}.{}.{}: {} rows",
                column.schema, column.table, column.column, column.row_count
            ))?;
        }
    }

    search_columns(session, &columns, &cli.search_string, options, console).await
}

/// Error line shown for a failure.
pub fn failure_message(error: &SqlGrepError) -> String {
    match error {
        SqlGrepError::Unknown { message } => format!("Something went wrong: {message}"),
        other if other.is_database() => format!("DB error: {other}"),
        other => format!("Generic error: {other}"),
    }
}

/// Runs one search against the compiled-in backend and returns the process
/// exit code.
pub async fn run<W: Write>(cli: &Cli, console: &mut Console<W>) -> u8 {
    run_with(cli, console, |settings| async move {
        session::connect(&settings).await
    })
    .await
}

/// Runs one search over the session opened by `connect`.
///
/// Failures are printed as a single error line; matches printed before the
/// failure are left in place. A panic during the search is reported as an
/// unknown failure.
pub async fn run_with<W, C, F>(cli: &Cli, console: &mut Console<W>, connect: C) -> u8
where
    W: Write,
    C: FnOnce(ConnectionSettings) -> F,
    F: Future<Output = sqlgrep_core::Result<Box<dyn Session>>>,
{
    let outcome = AssertUnwindSafe(search_database(cli, console, connect))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(SqlGrepError::unknown("the search was aborted")));

    match outcome {
        Ok(summary) => {
            tracing::debug!(
                "Searched {} columns, {} with matches",
                summary.columns_searched,
                summary.columns_with_matches
            );
            0
        }
        Err(error) => {
            tracing::debug!("Search failed: {:?}", error);
            if console.error(&failure_message(&error)).is_err() {
                tracing::error!("{}", failure_message(&error));
            }
            error.exit_code()
        }
    }
}
