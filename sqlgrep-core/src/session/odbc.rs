//! SQL Server session through the ODBC driver manager.
//!
//! Opens the connection with the full ODBC connection string, so the driver
//! name chosen by [`crate::driver`] is honoured. Text is fetched as UTF-16
//! to keep `nchar`/`nvarchar` values intact.

use super::{Row, Session};
use crate::connection::ConnectionSettings;
use crate::error::DatabaseDiagnostic;
use crate::query::{ParamStyle, Statement};
use crate::{Result, SqlGrepError};
use async_trait::async_trait;
use odbc_api::{
    Connection, ConnectionOptions, Cursor, Environment, IntoParameter, ResultSetMetadata,
};
use std::sync::OnceLock;

/// The process-wide ODBC environment.
///
/// # Errors
/// Returns [`SqlGrepError::DriverEnumeration`] if the driver manager cannot
/// allocate an environment handle.
pub fn environment() -> Result<&'static Environment> {
    static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();
    if let Some(environment) = ENVIRONMENT.get() {
        return Ok(environment);
    }
    let environment = Environment::new().map_err(|e| {
        SqlGrepError::driver_enumeration(format!("cannot allocate ODBC environment: {e}"))
    })?;
    Ok(ENVIRONMENT.get_or_init(|| environment))
}

/// An open ODBC connection.
pub struct OdbcSession {
    connection: Connection<'static>,
    description: String,
}

impl OdbcSession {
    /// Connects with the settings' ODBC connection string.
    ///
    /// # Errors
    /// Returns [`SqlGrepError::Authentication`] for rejected logins and
    /// [`SqlGrepError::Database`] for any other driver failure.
    pub fn connect(settings: &ConnectionSettings) -> Result<Self> {
        settings.validate()?;
        let connection_string = settings.to_odbc_string();

        let connection = environment()?
            .connect_with_connection_string(&connection_string, ConnectionOptions::default())
            .map_err(|e| SqlGrepError::database("Database connection failed", diagnostic(e)))?;

        Ok(Self {
            connection,
            description: format!("ODBC {settings}"),
        })
    }
}

fn diagnostic(error: odbc_api::Error) -> DatabaseDiagnostic {
    match error {
        odbc_api::Error::Diagnostics { record, .. } => DatabaseDiagnostic::new(
            Some(record.state.as_str().to_string()),
            Some(record.native_error),
            record_message(&record.to_string()),
        ),
        other => DatabaseDiagnostic::message(other.to_string()),
    }
}

/// Message part of a rendered diagnostic record.
///
/// Records render as `State: .., Native error: .., Message: ..` for both
/// narrow and wide driver manager builds.
fn record_message(rendered: &str) -> String {
    rendered
        .split_once("Message: ")
        .map_or(rendered, |(_, message)| message)
        .trim_end()
        .to_string()
}

fn query_failed(error: odbc_api::Error) -> SqlGrepError {
    SqlGrepError::database("Query failed", diagnostic(error))
}

#[async_trait]
impl Session for OdbcSession {
    fn param_style(&self) -> ParamStyle {
        ParamStyle::Positional
    }

    async fn query(&mut self, statement: &Statement) -> Result<Vec<Row>> {
        let params: Vec<_> = statement
            .params
            .iter()
            .map(|param| param.as_str().into_parameter())
            .collect();

        let Some(mut cursor) = self
            .connection
            .execute(&statement.sql, params.as_slice(), None)
            .map_err(query_failed)?
        else {
            return Ok(Vec::new());
        };

        let column_count = cursor.num_result_cols().map_err(query_failed)?;
        let column_count = u16::try_from(column_count)
            .map_err(|_| SqlGrepError::unknown("result has too many columns"))?;

        let mut rows = Vec::new();
        let mut buffer = Vec::new();
        while let Some(mut row) = cursor.next_row().map_err(query_failed)? {
            let mut values = Vec::with_capacity(usize::from(column_count));
            for column in 1..=column_count {
                buffer.clear();
                let present = row.get_wide_text(column, &mut buffer).map_err(query_failed)?;
                values.push(present.then(|| String::from_utf16_lossy(&buffer)));
            }
            rows.push(values);
        }
        Ok(rows)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthFailure, SQLSTATE_INVALID_AUTHORIZATION};

    #[test]
    fn test_record_message_strips_header() {
        let rendered = "State: 28000, Native error: 18456, Message: [Microsoft][ODBC Driver 18 for SQL Server][SQL Server]Login failed for user 'sa'.\n";
        assert_eq!(
            record_message(rendered),
            "[Microsoft][ODBC Driver 18 for SQL Server][SQL Server]Login failed for user 'sa'."
        );
    }

    #[test]
    fn test_record_message_without_header() {
        assert_eq!(record_message("driver gone "), "driver gone");
    }

    #[test]
    fn test_login_failure_classified() {
        let diagnostic = DatabaseDiagnostic::new(
            Some(SQLSTATE_INVALID_AUTHORIZATION.to_string()),
            Some(18456),
            record_message("State: 28000, Native error: 18456, Message: Login failed"),
        );
        assert_eq!(diagnostic.auth_failure(), Some(AuthFailure::LoginFailed));
    }

    #[test]
    fn test_blank_database_rejected_before_connecting() {
        let settings = ConnectionSettings::new("ODBC Driver 18 for SQL Server", "db", " ");
        let error = OdbcSession::connect(&settings).err();
        assert!(matches!(error, Some(SqlGrepError::Configuration { .. })));
    }
}
