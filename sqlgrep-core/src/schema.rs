//! String column discovery.

use crate::models::ColumnDescriptor;
use crate::query::{self, qualified_table};
use crate::session::{Session, single_count};
use crate::{Result, SqlGrepError};
use std::collections::HashMap;

/// Row counts keyed by quoted `[schema].[table]`.
///
/// Tables with several text columns are counted once.
#[derive(Debug, Default)]
pub struct RowCountCache {
    counts: HashMap<String, u64>,
}

impl RowCountCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the row count of a table, querying only on first use.
    ///
    /// # Errors
    /// Returns an error if the count query fails.
    pub async fn row_count<S>(&mut self, session: &mut S, schema: &str, table: &str) -> Result<u64>
    where
        S: Session + ?Sized,
    {
        let key = qualified_table(schema, table);
        if let Some(&count) = self.counts.get(&key) {
            return Ok(count);
        }

        let rows = session.query(&query::row_count(schema, table)).await?;
        let count = single_count(&rows, &key)?;
        self.counts.insert(key, count);
        Ok(count)
    }

    /// Number of distinct tables counted so far.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True when nothing has been counted yet.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Lists every `char`/`varchar`/`nchar`/`nvarchar` column of every base
/// table, ordered by schema, table and column, with row counts resolved.
///
/// # Errors
/// Returns an error if the catalog query or any count query fails.
pub async fn discover_string_columns<S>(session: &mut S) -> Result<Vec<ColumnDescriptor>>
where
    S: Session + ?Sized,
{
    let rows = session.query(&query::string_columns()).await?;

    let mut columns = rows
        .into_iter()
        .map(column_from_row)
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!("Catalog lists {} string columns", columns.len());

    let mut cache = RowCountCache::new();
    for column in &mut columns {
        column.row_count = cache
            .row_count(session, &column.schema, &column.table)
            .await?;
    }
    tracing::debug!("Counted rows of {} tables", cache.len());

    Ok(columns)
}

fn column_from_row(row: Vec<Option<String>>) -> Result<ColumnDescriptor> {
    let mut values = row.into_iter();
    let mut next = |field: &str| {
        values.next().flatten().ok_or_else(|| {
            SqlGrepError::unknown(format!("catalog row is missing {field}"))
        })
    };
    let schema = next("TABLE_SCHEMA")?;
    let table = next("TABLE_NAME")?;
    let column = next("COLUMN_NAME")?;
    Ok(ColumnDescriptor::new(schema, table, column))
}
