//! SQL text generation.
//!
//! Every statement the scanner and search engine issue is built here, so the
//! exact text can be tested without a database. Identifiers are embedded with
//! [`quote_identifier`]; search patterns are always bound as parameters.

use crate::escape::{LIKE_ESCAPE_CHAR, LikePattern};
use crate::models::MAX_DISPLAY_CHARS;

/// Catalog query listing every text column of every base table.
pub const STRING_COLUMNS_QUERY: &str = "select c.TABLE_SCHEMA, c.TABLE_NAME, c.COLUMN_NAME \
     from INFORMATION_SCHEMA.COLUMNS c \
     join INFORMATION_SCHEMA.TABLES t \
     on t.TABLE_SCHEMA = c.TABLE_SCHEMA and t.TABLE_NAME = c.TABLE_NAME \
     where c.DATA_TYPE in ('char', 'varchar', 'nchar', 'nvarchar') \
     and t.TABLE_TYPE = 'BASE TABLE' \
     order by c.TABLE_SCHEMA, c.TABLE_NAME, c.COLUMN_NAME";

/// How a backend marks bound parameters in SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStyle {
    /// `?` placeholders, bound in order (ODBC)
    Positional,
    /// `@P1`, `@P2`, ... placeholders (TDS)
    Numbered,
}

impl ParamStyle {
    /// Placeholder for the parameter at `index` (zero based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Positional => "?".to_string(),
            Self::Numbered => format!("@P{}", index.saturating_add(1)),
        }
    }
}

/// SQL text plus the string parameters bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Statement text
    pub sql: String,
    /// Values for the statement's placeholders, in order
    pub params: Vec<String>,
}

impl Statement {
    /// Statement with no parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)?;
        if !self.params.is_empty() {
            write!(f, " -- params: {:?}", self.params)?;
        }
        Ok(())
    }
}

/// Quotes an identifier with brackets, doubling any closing bracket.
///
/// ```rust
/// use sqlgrep_core::query::quote_identifier;
///
/// assert_eq!(quote_identifier("Order Details"), "[Order Details]");
/// assert_eq!(quote_identifier("odd]name"), "[odd]]name]");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// `[schema].[table]`, also used as the row count cache key.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table))
}

/// Statement listing every text column of every base table.
pub fn string_columns() -> Statement {
    Statement::new(STRING_COLUMNS_QUERY)
}

/// Statement counting the rows of one table.
pub fn row_count(schema: &str, table: &str) -> Statement {
    Statement::new(format!(
        "select count_big(*) from {}",
        qualified_table(schema, table)
    ))
}

/// Statement fetching up to `max_results + 1` matching values from one column.
///
/// The extra row tells the caller whether more matches exist. Values are cut
/// server side to one character past the display limit so the caller can
/// tell when to append the truncation marker.
pub fn column_search(
    schema: &str,
    table: &str,
    column: &str,
    pattern: &LikePattern,
    max_results: u32,
    style: ParamStyle,
) -> Statement {
    let fetch = u64::from(max_results).saturating_add(1);
    let width = MAX_DISPLAY_CHARS.saturating_add(1);
    let quoted = quote_identifier(column);
    Statement {
        sql: format!(
            "select top ({fetch}) cast(left({quoted}, {width}) as nvarchar({width})) \
             from {table} where {quoted} like {placeholder} escape '{LIKE_ESCAPE_CHAR}'",
            table = qualified_table(schema, table),
            placeholder = style.placeholder(0),
        ),
        params: vec![pattern.as_str().to_string()],
    }
}
