//! Database session abstraction.
//!
//! The scanner and search engine only need "run this statement, give me the
//! rows". Backends are feature-gated:
//! - `mssql`: native TDS client (`tiberius`)
//! - `odbc`: ODBC driver manager (`odbc-api`), honouring the driver name
//!
//! Statements are issued one at a time; a session is owned by a single caller
//! for the whole scan.

use crate::connection::ConnectionSettings;
use crate::query::{ParamStyle, Statement};
use crate::{Result, SqlGrepError};
use async_trait::async_trait;

#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "odbc")]
pub mod odbc;

/// True when [`connect`] goes through the driver manager and so uses
/// [`ConnectionSettings::driver`]; the TDS backend connects directly.
pub const USES_DRIVER_NAME: bool = cfg!(feature = "odbc");

/// One result row. Every value is read as text; SQL `NULL` is `None`.
pub type Row = Vec<Option<String>>;

/// An open connection that can run statements.
///
/// # Object Safety
/// Used as `Box<dyn Session>` by the orchestrator.
#[async_trait]
pub trait Session: Send {
    /// Placeholder style this backend expects.
    fn param_style(&self) -> ParamStyle;

    /// Runs a statement and returns all rows of its first result set.
    ///
    /// # Errors
    /// Returns [`SqlGrepError::Database`] or [`SqlGrepError::Authentication`]
    /// when the statement fails.
    async fn query(&mut self, statement: &Statement) -> Result<Vec<Row>>;

    /// Short description for logs; never contains credentials.
    fn describe(&self) -> String;
}

/// Opens a session with the backend compiled into this build.
///
/// ODBC is preferred when both backends are available, since only it uses
/// the resolved driver name.
///
/// # Errors
/// Returns an error if the connection cannot be established or no backend
/// was compiled in.
pub async fn connect(settings: &ConnectionSettings) -> Result<Box<dyn Session>> {
    tracing::debug!("Opening session to {}", settings);
    open_backend(settings).await
}

#[cfg(feature = "odbc")]
#[allow(clippy::unused_async)]
async fn open_backend(settings: &ConnectionSettings) -> Result<Box<dyn Session>> {
    Ok(Box::new(odbc::OdbcSession::connect(settings)?))
}

#[cfg(all(feature = "mssql", not(feature = "odbc")))]
async fn open_backend(settings: &ConnectionSettings) -> Result<Box<dyn Session>> {
    Ok(Box::new(mssql::TdsSession::connect(settings).await?))
}

#[cfg(not(any(feature = "mssql", feature = "odbc")))]
#[allow(clippy::unused_async)]
async fn open_backend(_settings: &ConnectionSettings) -> Result<Box<dyn Session>> {
    Err(SqlGrepError::configuration(
        "No database backend available. Compile with --features mssql or --features odbc",
    ))
}

/// Reads the single unsigned integer a `count` statement returns.
///
/// # Errors
/// Returns an error if the result is empty, `NULL` or not a number.
pub fn single_count(rows: &[Row], context: &str) -> Result<u64> {
    let value = rows
        .first()
        .and_then(|row| row.first())
        .and_then(Option::as_deref)
        .ok_or_else(|| SqlGrepError::unknown(format!("{context}: query returned no value")))?;
    value.trim().parse::<u64>().map_err(|e| {
        SqlGrepError::unknown(format!("{context}: unexpected count '{value}': {e}"))
    })
}
