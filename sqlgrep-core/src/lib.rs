//! Core of sqlgrep: find a string in every text column of a SQL Server
//! database.
//!
//! # Pipeline
//! 1. [`driver`] picks an installed ODBC driver when none is named
//! 2. [`session`] opens a connection through the compiled-in backend
//! 3. [`schema`] lists the text columns of every base table with row counts
//! 4. [`search`] queries each column with an escaped `LIKE` pattern
//!    ([`escape`], [`query`]) and reports matches and [`progress`]
//!
//! Every stage returns [`SqlGrepError`]; nothing is retried.

pub mod connection;
pub mod driver;
pub mod error;
pub mod escape;
pub mod logging;
pub mod models;
pub mod progress;
pub mod query;
pub mod schema;
pub mod search;
pub mod session;

// Re-export commonly used types
pub use connection::{ConnectionSettings, Credentials};
pub use driver::{DriverCandidate, DriverSource, resolve_driver};
pub use error::{AuthFailure, DatabaseDiagnostic, Result, SqlGrepError};
pub use logging::init_logging;
pub use models::{ColumnDescriptor, MatchResult, SearchProgress, SearchSummary};
pub use schema::discover_string_columns;
pub use search::{SearchOptions, SearchSink, search_column, search_columns};
pub use session::{Row, Session};
