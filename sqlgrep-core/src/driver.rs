//! ODBC driver resolution.
//!
//! When no driver is named on the command line the installed drivers are
//! ranked by family and version:
//! 1. `ODBC Driver <n> for SQL Server`
//! 2. `SQL Server Native Client <n>`
//! 3. `SQL Server`
//!
//! The first family with any installed member wins, and within it the highest
//! major version. Only the leading integer of the version is compared.

use crate::{Result, SqlGrepError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Returned when no recognised driver is installed.
pub const FALLBACK_DRIVER: &str = "SQL Server";

/// An installed driver that belongs to a recognised family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverCandidate {
    /// Driver name as registered
    pub name: String,
    /// Leading integer of the version token, 0 when absent
    pub parsed_version: u32,
}

/// A driver family: a name pattern and its rank (lower is preferred).
struct FamilyMatcher {
    priority: u8,
    pattern: Regex,
}

impl FamilyMatcher {
    fn candidate(&self, name: &str) -> Option<DriverCandidate> {
        let captures = self.pattern.captures(name)?;
        let parsed_version = captures
            .name("version")
            .map_or(0, |version| leading_integer(version.as_str()));
        Some(DriverCandidate {
            name: name.to_string(),
            parsed_version,
        })
    }
}

fn families() -> &'static [FamilyMatcher] {
    static FAMILIES: OnceLock<Vec<FamilyMatcher>> = OnceLock::new();
    FAMILIES.get_or_init(|| {
        #[allow(clippy::expect_used)]
        let compile = |priority, pattern| FamilyMatcher {
            priority,
            pattern: Regex::new(pattern).expect("Invalid driver family pattern"),
        };
        vec![
            compile(0, r"^ODBC Driver (?<version>\S+) for SQL Server$"),
            compile(1, r"^SQL Server Native Client (?<version>\S+)$"),
            compile(2, r"^SQL Server$"),
        ]
    })
}

/// Parses the leading decimal digits of `token`; anything else is 0.
fn leading_integer(token: &str) -> u32 {
    let digits = token
        .find(|c: char| !c.is_ascii_digit())
        .map_or(token, |end| &token[..end]);
    digits.parse().unwrap_or(0)
}

/// Picks the preferred driver among `names`.
///
/// Returns `None` when no name belongs to a recognised family.
pub fn select_driver<S: AsRef<str>>(names: &[S]) -> Option<DriverCandidate> {
    families().iter().find_map(|family| {
        names
            .iter()
            .filter_map(|name| family.candidate(name.as_ref()))
            .inspect(|candidate| {
                tracing::trace!(
                    "Driver '{}' matches family {} (version {})",
                    candidate.name,
                    family.priority,
                    candidate.parsed_version
                );
            })
            .reduce(|best, next| {
                if next.parsed_version > best.parsed_version {
                    next
                } else {
                    best
                }
            })
    })
}

/// Something that can list the installed ODBC drivers.
pub trait DriverSource {
    /// Names of all installed drivers.
    ///
    /// # Errors
    /// Returns [`SqlGrepError::DriverEnumeration`] if the list cannot be read.
    fn driver_names(&self) -> Result<Vec<String>>;
}

/// Resolves the driver to use, calling `on_not_found` before falling back.
///
/// # Errors
/// Propagates enumeration failures; they are not retried.
pub fn resolve_driver<D, F>(source: &D, on_not_found: F) -> Result<String>
where
    D: DriverSource + ?Sized,
    F: FnOnce(),
{
    let names = source.driver_names()?;
    tracing::debug!("Found {} installed ODBC drivers", names.len());
    match select_driver(&names) {
        Some(candidate) => {
            tracing::debug!("Selected driver '{}'", candidate.name);
            Ok(candidate.name)
        }
        None => {
            on_not_found();
            Ok(FALLBACK_DRIVER.to_string())
        }
    }
}

/// A fixed driver list.
#[derive(Debug, Clone, Default)]
pub struct StaticDriverSource(pub Vec<String>);

impl DriverSource for StaticDriverSource {
    fn driver_names(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Reads the unixODBC driver registry (`odbcinst.ini`).
///
/// Each section header names an installed driver, except `[ODBC]`, which
/// holds driver manager settings.
#[derive(Debug, Clone)]
pub struct OdbcInstSource {
    path: PathBuf,
}

impl OdbcInstSource {
    /// Uses the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Locates `odbcinst.ini` the way unixODBC does: `$ODBCSYSINI` or `/etc`.
    pub fn system() -> Self {
        let dir = std::env::var_os("ODBCSYSINI").map_or_else(|| PathBuf::from("/etc"), PathBuf::from);
        let file = std::env::var_os("ODBCINSTINI").unwrap_or_else(|| "odbcinst.ini".into());
        Self::new(dir.join(file))
    }

    /// The registry file being read.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DriverSource for OdbcInstSource {
    fn driver_names(&self) -> Result<Vec<String>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No driver registry at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(SqlGrepError::driver_enumeration(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };
        Ok(parse_odbcinst(&contents))
    }
}

fn parse_odbcinst(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('[')?.strip_suffix(']'))
        .map(str::trim)
        .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case("ODBC"))
        .map(String::from)
        .collect()
}

/// The driver list of the platform driver manager.
#[cfg(feature = "odbc")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverManagerSource;

#[cfg(feature = "odbc")]
impl DriverSource for DriverManagerSource {
    fn driver_names(&self) -> Result<Vec<String>> {
        let environment = crate::session::odbc::environment()?;
        let drivers = environment.drivers().map_err(|e| {
            SqlGrepError::driver_enumeration(format!("cannot list ODBC drivers: {e}"))
        })?;
        Ok(drivers.into_iter().map(|info| info.description).collect())
    }
}

/// Driver list of this build: the driver manager with the `odbc` feature,
/// otherwise the unixODBC registry file.
pub fn installed_drivers() -> Box<dyn DriverSource> {
    #[cfg(feature = "odbc")]
    {
        Box::new(DriverManagerSource)
    }
    #[cfg(not(feature = "odbc"))]
    {
        Box::new(OdbcInstSource::system())
    }
}
