//! Connection settings and ODBC connection string assembly.
//!
//! Credentials live in `Zeroizing` containers and are cleared on drop. The
//! `Display` impl of [`ConnectionSettings`] never includes them.

use crate::{Result, SqlGrepError};
use zeroize::{Zeroize, Zeroizing};

/// Default server when none is given.
pub const DEFAULT_SERVER: &str = "localhost";

/// Default TDS port.
pub const DEFAULT_PORT: u16 = 1433;

/// SQL Server login, cleared from memory on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Credentials {
    username: Zeroizing<String>,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Creates credentials for SQL Server authentication.
    pub fn new(username: String, password: String) -> Self {
        Self {
            username: Zeroizing::new(username),
            password: Zeroizing::new(password),
        }
    }

    /// Login name
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password; never log this.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username.as_str())
            .field("password", &"****")
            .finish()
    }
}

/// Where the server lives, parsed from the `--server` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    /// Host name or address
    pub host: String,
    /// Explicit port (`host,port`)
    pub port: Option<u16>,
    /// Named instance (`host\instance`)
    pub instance: Option<String>,
}

impl ServerAddress {
    /// Parses `host`, `host,port`, `host\instance` and an optional `tcp:` prefix.
    ///
    /// # Errors
    /// Returns a configuration error for an empty host or an invalid port.
    pub fn parse(server: &str) -> Result<Self> {
        let server = server.trim();
        let server = server
            .strip_prefix("tcp:")
            .or_else(|| server.strip_prefix("TCP:"))
            .unwrap_or(server);

        let (rest, port) = match server.rsplit_once(',') {
            Some((rest, port)) => {
                let port = port.trim().parse::<u16>().map_err(|_| {
                    SqlGrepError::configuration(format!("invalid port in server '{server}'"))
                })?;
                (rest, Some(port))
            }
            None => (server, None),
        };

        let (host, instance) = match rest.split_once('\\') {
            Some((host, instance)) if !instance.is_empty() => (host, Some(instance.to_string())),
            Some((host, _)) => (host, None),
            None => (rest, None),
        };

        let host = match host.trim() {
            "" => {
                return Err(SqlGrepError::configuration("server name cannot be empty"));
            }
            "." | "(local)" => DEFAULT_SERVER,
            other => other,
        };

        Ok(Self {
            host: host.to_string(),
            port,
            instance,
        })
    }
}

/// Everything needed to open a session.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// ODBC driver name
    pub driver: String,
    /// Server, as given on the command line
    pub server: String,
    /// Database to search
    pub database: String,
    /// SQL login; `None` means trusted (integrated) authentication
    pub credentials: Option<Credentials>,
    /// Skip server certificate validation
    pub trust_server_certificate: bool,
}

impl ConnectionSettings {
    /// Creates settings using trusted authentication.
    pub fn new(
        driver: impl Into<String>,
        server: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            driver: driver.into(),
            server: server.into(),
            database: database.into(),
            credentials: None,
            trust_server_certificate: false,
        }
    }

    /// Builder method to use SQL Server authentication.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Builder method to accept any server certificate.
    #[must_use]
    pub const fn with_trust_server_certificate(mut self, trust: bool) -> Self {
        self.trust_server_certificate = trust;
        self
    }

    /// True when no login was supplied.
    pub const fn uses_trusted_connection(&self) -> bool {
        self.credentials.is_none()
    }

    /// Validates settings before connecting.
    ///
    /// # Errors
    /// Returns error if the driver, server or database is empty.
    pub fn validate(&self) -> Result<()> {
        if self.driver.trim().is_empty() {
            return Err(SqlGrepError::configuration("driver cannot be empty"));
        }
        if self.database.trim().is_empty() {
            return Err(SqlGrepError::configuration("database cannot be empty"));
        }
        ServerAddress::parse(&self.server).map(|_| ())
    }

    /// `Driver={..};Server=..;Database=..;` followed by the credential part.
    ///
    /// The result contains the password when one is set; pass it through
    /// [`crate::error::redact_connection_string`] before logging.
    pub fn to_odbc_string(&self) -> Zeroizing<String> {
        let mut out = format!(
            "Driver={{{}}};Server={};Database={};",
            self.driver.replace('}', "}}"),
            attribute_value(&self.server),
            attribute_value(&self.database),
        );
        match &self.credentials {
            Some(credentials) => {
                out.push_str("Uid=");
                out.push_str(&attribute_value(credentials.username()));
                out.push_str(";Pwd=");
                out.push_str(&attribute_value(credentials.password()));
            }
            None => out.push_str("Trusted_Connection=Yes"),
        }
        if self.trust_server_certificate {
            out.push_str(";TrustServerCertificate=Yes");
        }
        Zeroizing::new(out)
    }
}

impl std::fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} via '{}' ({})",
            self.server,
            self.database,
            self.driver,
            if self.uses_trusted_connection() {
                "trusted connection"
            } else {
                "SQL Server authentication"
            }
        )
        // Intentionally omit username and password
    }
}

/// Brace-quotes an attribute value when the raw form would be misparsed.
fn attribute_value(value: &str) -> String {
    let needs_braces = value.contains([';', '{', '}'])
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace);
    if needs_braces {
        format!("{{{}}}", value.replace('}', "}}"))
    } else {
        value.to_string()
    }
}
