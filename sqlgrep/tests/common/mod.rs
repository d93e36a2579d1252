//! Helpers shared by the command-line tests.

#![allow(dead_code, clippy::unwrap_used)]

use async_trait::async_trait;
use clap::Parser;
use sqlgrep::Cli;
use sqlgrep::console::Console;
use sqlgrep_core::query::{self, ParamStyle, Statement};
use sqlgrep_core::{DatabaseDiagnostic, Result, Row, Session, SqlGrepError};

const ENV_VARS: [&str; 4] = [
    "SQLGREP_SERVER",
    "SQLGREP_DRIVER",
    "SQLGREP_USER",
    "SQLGREP_PASSWORD",
];

/// Parses `sqlgrep <args>` with the `SQLGREP_*` variables cleared.
pub fn parse_cli(args: &[&str]) -> Cli {
    temp_env::with_vars_unset(ENV_VARS, || {
        Cli::try_parse_from(std::iter::once("sqlgrep").chain(args.iter().copied())).unwrap()
    })
}

pub fn console() -> Console<Vec<u8>> {
    Console::new(Vec::new(), false)
}

pub fn transcript(console: Console<Vec<u8>>) -> String {
    String::from_utf8(console.into_inner()).unwrap()
}

/// A database with one table, `dbo.People`, and one text column, `Name`.
///
/// Every search returns `matches`; statements containing `fail_on` fail.
pub struct ScriptedSession {
    pub row_count: u64,
    pub matches: Vec<String>,
    pub fail_on: Option<(&'static str, DatabaseDiagnostic)>,
}

impl ScriptedSession {
    pub fn with_matches(row_count: u64, matches: &[&str]) -> Self {
        Self {
            row_count,
            matches: matches.iter().map(|m| (*m).to_string()).collect(),
            fail_on: None,
        }
    }

    pub fn failing_on(mut self, marker: &'static str, diagnostic: DatabaseDiagnostic) -> Self {
        self.fail_on = Some((marker, diagnostic));
        self
    }

    pub fn boxed(self) -> Box<dyn Session> {
        Box::new(self)
    }
}

#[async_trait]
impl Session for ScriptedSession {
    fn param_style(&self) -> ParamStyle {
        ParamStyle::Numbered
    }

    async fn query(&mut self, statement: &Statement) -> Result<Vec<Row>> {
        if let Some((marker, diagnostic)) = &self.fail_on {
            if statement.sql.contains(marker) {
                return Err(SqlGrepError::database("Query failed", diagnostic.clone()));
            }
        }

        if statement.sql == query::STRING_COLUMNS_QUERY {
            return Ok(vec![vec![
                Some("dbo".to_string()),
                Some("People".to_string()),
                Some("Name".to_string()),
            ]]);
        }
        if statement.sql == query::row_count("dbo", "People").sql {
            return Ok(vec![vec![Some(self.row_count.to_string())]]);
        }
        Ok(self
            .matches
            .iter()
            .map(|value| vec![Some(value.clone())])
            .collect())
    }

    fn describe(&self) -> String {
        "scripted database".to_string()
    }
}
