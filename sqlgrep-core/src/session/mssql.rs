//! SQL Server session over the native TDS protocol.
//!
//! Uses `tiberius` on a tokio `TcpStream`. The ODBC driver name is not used
//! by this backend; server, database and login come from
//! [`ConnectionSettings`].

use super::{Row, Session};
use crate::connection::{ConnectionSettings, ServerAddress};
use crate::error::{DatabaseDiagnostic, SQLSTATE_INVALID_AUTHORIZATION};
use crate::query::{ParamStyle, Statement};
use crate::{Result, SqlGrepError};
use async_trait::async_trait;
use std::borrow::Cow;
use tiberius::{AuthMethod, Client, ColumnData, Config, SqlBrowser, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

const APPLICATION_NAME: &str = "sqlgrep";

/// An open TDS connection.
pub struct TdsSession {
    client: Client<Compat<TcpStream>>,
    description: String,
}

impl TdsSession {
    /// Connects and logs in.
    ///
    /// # Errors
    /// Returns [`SqlGrepError::Authentication`] when the login is rejected,
    /// [`SqlGrepError::Database`] for any other connection failure.
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self> {
        settings.validate()?;
        let address = ServerAddress::parse(&settings.server)?;
        let config = tds_config(settings, &address)?;

        let tcp = if address.instance.is_some() && address.port.is_none() {
            TcpStream::connect_named(&config)
                .await
                .map_err(|e| connection_error(e, false))?
        } else {
            TcpStream::connect(config.get_addr()).await.map_err(|e| {
                SqlGrepError::database(
                    "Cannot reach server",
                    DatabaseDiagnostic::message(e.to_string()),
                )
            })?
        };
        tcp.set_nodelay(true)
            .map_err(|e| SqlGrepError::io("Failed to configure socket", e))?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| connection_error(e, true))?;

        Ok(Self {
            client,
            description: format!("SQL Server {}/{}", address.host, settings.database),
        })
    }
}

/// Builds the tiberius configuration for `settings`.
fn tds_config(settings: &ConnectionSettings, address: &ServerAddress) -> Result<Config> {
    let mut config = Config::new();
    config.host(&address.host);
    if let Some(port) = address.port {
        config.port(port);
    }
    if let Some(instance) = &address.instance {
        config.instance_name(instance);
    }
    config.database(&settings.database);
    config.application_name(APPLICATION_NAME);
    if settings.trust_server_certificate {
        config.trust_cert();
    }

    let auth = match &settings.credentials {
        Some(credentials) => AuthMethod::sql_server(credentials.username(), credentials.password()),
        None => integrated_auth()?,
    };
    config.authentication(auth);
    Ok(config)
}

#[cfg(windows)]
#[allow(clippy::unnecessary_wraps)]
fn integrated_auth() -> Result<AuthMethod> {
    Ok(AuthMethod::Integrated)
}

#[cfg(not(windows))]
fn integrated_auth() -> Result<AuthMethod> {
    Err(SqlGrepError::configuration(
        "Trusted connections need Windows integrated authentication on this backend; \
         supply --user-name and --password",
    ))
}

/// Maps a tiberius failure to a classified error.
///
/// Server errors raised while logging in carry SQL state `28000`, matching
/// what the ODBC driver reports for the same failures.
fn connection_error(error: tiberius::error::Error, during_login: bool) -> SqlGrepError {
    let diagnostic = diagnostic(error, during_login);
    SqlGrepError::database("Database connection failed", diagnostic)
}

fn diagnostic(error: tiberius::error::Error, during_login: bool) -> DatabaseDiagnostic {
    match error {
        tiberius::error::Error::Server(token) => DatabaseDiagnostic::new(
            during_login.then(|| SQLSTATE_INVALID_AUTHORIZATION.to_string()),
            i32::try_from(token.code()).ok(),
            token.message(),
        ),
        other => DatabaseDiagnostic::message(other.to_string()),
    }
}

fn text_value(data: ColumnData<'static>) -> Result<Option<String>> {
    let value = match data {
        ColumnData::String(value) => value.map(Cow::into_owned),
        ColumnData::I64(value) => value.map(|v| v.to_string()),
        ColumnData::I32(value) => value.map(|v| v.to_string()),
        ColumnData::I16(value) => value.map(|v| v.to_string()),
        ColumnData::U8(value) => value.map(|v| v.to_string()),
        ColumnData::Bit(value) => value.map(|v| v.to_string()),
        other => {
            return Err(SqlGrepError::unknown(format!(
                "unexpected column type in result: {other:?}"
            )));
        }
    };
    Ok(value)
}

#[async_trait]
impl Session for TdsSession {
    fn param_style(&self) -> ParamStyle {
        ParamStyle::Numbered
    }

    async fn query(&mut self, statement: &Statement) -> Result<Vec<Row>> {
        let params: Vec<&dyn ToSql> = statement
            .params
            .iter()
            .map(|param| param as &dyn ToSql)
            .collect();

        let stream = self
            .client
            .query(statement.sql.as_str(), &params)
            .await
            .map_err(|e| SqlGrepError::database("Query failed", diagnostic(e, false)))?;

        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| SqlGrepError::database("Reading results failed", diagnostic(e, false)))?;

        rows.into_iter()
            .map(|row| row.into_iter().map(text_value).collect())
            .collect()
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Credentials;

    fn sql_login(server: &str) -> ConnectionSettings {
        ConnectionSettings::new("SQL Server", server, "Sales")
            .with_credentials(Credentials::new("sa".to_string(), "secret".to_string()))
    }

    #[test]
    fn test_config_default_port() {
        let settings = sql_login("db.example.com");
        let address = ServerAddress::parse(&settings.server).ok();
        let config = address.and_then(|a| tds_config(&settings, &a).ok());
        assert_eq!(
            config.map(|c| c.get_addr()),
            Some("db.example.com:1433".to_string())
        );
    }

    #[test]
    fn test_config_explicit_port() {
        let settings = sql_login("db,14330");
        let address = ServerAddress::parse(&settings.server).ok();
        let config = address.and_then(|a| tds_config(&settings, &a).ok());
        assert_eq!(config.map(|c| c.get_addr()), Some("db:14330".to_string()));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_trusted_connection_unavailable() {
        let settings = ConnectionSettings::new("SQL Server", "localhost", "Sales");
        let address = ServerAddress {
            host: "localhost".to_string(),
            port: None,
            instance: None,
        };
        let error = tds_config(&settings, &address).err();
        assert!(matches!(error, Some(SqlGrepError::Configuration { .. })));
    }

    #[test]
    fn test_text_values() {
        assert_eq!(
            text_value(ColumnData::I64(Some(42))).ok(),
            Some(Some("42".to_string()))
        );
        assert_eq!(
            text_value(ColumnData::String(Some(Cow::Borrowed("Alice")))).ok(),
            Some(Some("Alice".to_string()))
        );
        assert_eq!(text_value(ColumnData::String(None)).ok(), Some(None));
        assert!(text_value(ColumnData::F64(Some(1.5))).is_err());
    }

    #[tokio::test]
    async fn test_connect_unreachable_server_fails_gracefully() {
        let settings = sql_login("127.0.0.1,1");
        let result = TdsSession::connect(&settings).await;
        assert!(matches!(result, Err(SqlGrepError::Database { .. })));
    }
}
