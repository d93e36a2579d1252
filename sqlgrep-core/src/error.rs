//! Error taxonomy for the search pipeline.
//!
//! Every stage of a scan returns [`SqlGrepError`]; nothing is recovered
//! internally. The binary classifies the error once at the top level, prints a
//! single line and exits with [`SqlGrepError::exit_code`].
//!
//! Passwords never appear in these messages. Connection strings are passed
//! through [`redact_connection_string`] before they are logged.

use thiserror::Error;

/// SQL state reported by SQL Server for authorization failures.
pub const SQLSTATE_INVALID_AUTHORIZATION: &str = "28000";

/// Native error raised when the server refuses a trusted connection.
pub const NATIVE_UNTRUSTED_DOMAIN: i32 = 18452;

/// Native error raised when a login is rejected.
pub const NATIVE_LOGIN_FAILED: i32 = 18456;

/// Which kind of authentication the server rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// Integrated (trusted) authentication was refused.
    TrustedConnectionRejected,
    /// The supplied user name or password was refused.
    LoginFailed,
}

impl AuthFailure {
    /// User-facing hint explaining how to recover.
    pub const fn hint(self) -> &'static str {
        match self {
            Self::TrustedConnectionRejected => {
                "The server rejected the trusted connection. \
                 Supply --user-name and --password to use SQL Server authentication."
            }
            Self::LoginFailed => "Login failed. Check the user name and password.",
        }
    }
}

/// Diagnostic record returned by the database layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseDiagnostic {
    /// Five character SQL state, when the backend reports one
    pub sql_state: Option<String>,
    /// Vendor specific error number
    pub native_code: Option<i32>,
    /// Server or driver message
    pub message: String,
}

impl DatabaseDiagnostic {
    /// Creates a diagnostic that carries only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Creates a diagnostic with state and native code.
    pub fn new(sql_state: Option<String>, native_code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            sql_state,
            native_code,
            message: message.into(),
        }
    }

    /// Returns the authentication failure this diagnostic describes, if any.
    ///
    /// Only the two login failures SQL Server reports under SQL state `28000`
    /// are recognised. Anything else is an ordinary database error.
    pub fn auth_failure(&self) -> Option<AuthFailure> {
        if self.sql_state.as_deref() != Some(SQLSTATE_INVALID_AUTHORIZATION) {
            return None;
        }
        match self.native_code {
            Some(NATIVE_UNTRUSTED_DOMAIN) => Some(AuthFailure::TrustedConnectionRejected),
            Some(NATIVE_LOGIN_FAILED) => Some(AuthFailure::LoginFailed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DatabaseDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.sql_state, self.native_code) {
            (Some(state), Some(code)) => write!(f, "[{state}] ({code}) {}", self.message),
            (Some(state), None) => write!(f, "[{state}] {}", self.message),
            (None, Some(code)) => write!(f, "({code}) {}", self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

/// Main error type for sqlgrep operations.
#[derive(Debug, Error)]
pub enum SqlGrepError {
    /// The installed driver list could not be read
    #[error("Driver enumeration failed: {context}")]
    DriverEnumeration { context: String },

    /// The server rejected the credentials or the trusted connection
    #[error("{}", .failure.hint())]
    Authentication {
        failure: AuthFailure,
        diagnostic: DatabaseDiagnostic,
    },

    /// Any other database-layer failure
    #[error("{context}: {diagnostic}")]
    Database {
        context: String,
        diagnostic: DatabaseDiagnostic,
    },

    /// Invalid settings or an unsupported build configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// I/O operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Failure that fits no other category
    #[error("{message}")]
    Unknown { message: String },
}

/// Convenience type alias for Results with SqlGrepError
pub type Result<T> = std::result::Result<T, SqlGrepError>;

impl SqlGrepError {
    /// Classifies a database diagnostic.
    ///
    /// Authentication failures are split out so the caller can print a hint
    /// and exit with a distinct code; everything else becomes
    /// [`SqlGrepError::Database`].
    pub fn database(context: impl Into<String>, diagnostic: DatabaseDiagnostic) -> Self {
        match diagnostic.auth_failure() {
            Some(failure) => Self::Authentication {
                failure,
                diagnostic,
            },
            None => Self::Database {
                context: context.into(),
                diagnostic,
            },
        }
    }

    /// Creates a driver enumeration error
    pub fn driver_enumeration(context: impl Into<String>) -> Self {
        Self::DriverEnumeration {
            context: context.into(),
        }
    }

    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates an unclassified error
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Process exit code for this failure.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Authentication { .. } => 2,
            Self::Unknown { .. } => 3,
            Self::DriverEnumeration { .. }
            | Self::Database { .. }
            | Self::Configuration { .. }
            | Self::Io { .. } => 1,
        }
    }

    /// True for failures that came from the database layer.
    pub const fn is_database(&self) -> bool {
        matches!(self, Self::Database { .. } | Self::Authentication { .. })
    }
}

/// Masks the password in an ODBC style connection string.
///
/// # Example
///
/// ```rust
/// use sqlgrep_core::error::redact_connection_string;
///
/// let redacted = redact_connection_string("Server=db;Uid=sa;Pwd=secret");
/// assert_eq!(redacted, "Server=db;Uid=sa;Pwd=****");
/// ```
pub fn redact_connection_string(connection_string: &str) -> String {
    split_attributes(connection_string)
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, _))
                if key.trim().eq_ignore_ascii_case("pwd")
                    || key.trim().eq_ignore_ascii_case("password") =>
            {
                format!("{key}=****")
            }
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Splits `key=value` pairs on `;`, keeping brace-quoted values intact.
fn split_attributes(connection_string: &str) -> Vec<&str> {
    let mut pairs = Vec::new();
    let mut in_braces = false;
    let mut start = 0;
    let mut chars = connection_string.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        match ch {
            '{' if !in_braces => in_braces = true,
            '}' if in_braces => {
                if chars.peek().is_some_and(|&(_, next)| next == '}') {
                    chars.next();
                } else {
                    in_braces = false;
                }
            }
            ';' if !in_braces => {
                pairs.push(&connection_string[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    pairs.push(&connection_string[start..]);
    pairs
}
