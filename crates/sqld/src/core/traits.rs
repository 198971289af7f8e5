//! Seams between the query pipeline and a concrete database.
//!
//! - [`Dialect`]: identifier quoting and positional markers
//! - [`Connection`]: executes a rewritten statement and returns raw rows
//!
//! Everything above these traits is driver independent; adding a database
//! means adding an implementation of each.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::value::Value;
use crate::error::Result;

/// SQL syntax strategy for a database engine.
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier (e.g., "postgres").
    fn name(&self) -> &str;

    /// Validate and quote an identifier (table name, column name, etc.).
    fn quote_ident(&self, name: &str) -> Result<String>;

    /// Validate and quote a storage location (`table` or `schema.table`).
    fn quote_location(&self, location: &str) -> Result<String>;

    /// Get a parameter placeholder for the given 1-based index.
    ///
    /// PostgreSQL: `$1`, `$2`, etc.
    fn param_placeholder(&self, index: usize) -> String;
}

/// One row as delivered by a driver: column names with native values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    columns: Vec<(String, Value)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Append a column. Later duplicates are shadowed by the first.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.columns.push((name.into(), value));
    }

    pub fn column(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value.into());
        self
    }

    /// Value of the first column with this name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Result columns a driver should decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ColumnSet {
    /// Every returned column.
    #[default]
    All,
    /// Only these column names; anything else is skipped undecoded.
    Only(HashSet<String>),
}

impl ColumnSet {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSet::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            ColumnSet::All => true,
            ColumnSet::Only(names) => names.contains(name),
        }
    }
}

/// A database handle that can run a parameterized statement.
///
/// Implementations only see statement text with positional markers and the
/// ordered, driver-native arguments. They decode the columns named by the
/// [`ColumnSet`] into native [`Value`]s and leave schema mapping to the
/// executor.
///
/// When `cancel` fires, an implementation must stop the statement on the
/// server (or discard the session running it) and return
/// [`SqldError::Cancelled`](crate::error::SqldError::Cancelled) promptly.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Connection kind (e.g., "native", "sqlx"), for logging.
    fn kind(&self) -> &str;

    /// Execute a statement and return all rows in order.
    async fn query(
        &self,
        cancel: &CancellationToken,
        sql: &str,
        args: &[Value],
        columns: &ColumnSet,
    ) -> Result<Vec<RawRow>>;

    /// Check the connection is usable.
    async fn ping(&self) -> Result<()> {
        self.query(&CancellationToken::new(), "SELECT 1", &[], &ColumnSet::All)
            .await
            .map(|_| ())
    }
}

/// Build a [`RawRow`] from the columns of one driver row, decoding only the
/// wanted ones.
///
/// `decode` receives the column index and name.
pub fn decode_wanted<'a, I, F>(names: I, columns: &ColumnSet, mut decode: F) -> Result<RawRow>
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(usize, &str) -> Result<Value>,
{
    let mut raw = RawRow::new();
    for (idx, name) in names.into_iter().enumerate() {
        if columns.contains(name) {
            let value = decode(idx, name)?;
            raw.push(name, value);
        }
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SqldError;

    #[test]
    fn test_raw_row_lookup_first_wins() {
        let row = RawRow::new()
            .column("id", 1i64)
            .column("name", "Ada")
            .column("id", 2i64);
        assert_eq!(row.len(), 3);
        assert_eq!(row.get("id"), Some(&Value::Integer(1)));
        assert_eq!(row.get("missing"), None);
        let names: Vec<&str> = row.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["id", "name", "id"]);
    }

    #[test]
    fn test_column_set_membership() {
        assert!(ColumnSet::All.contains("anything"));
        let only = ColumnSet::only(["id", "full_name"]);
        assert!(only.contains("full_name"));
        assert!(!only.contains("tag"));
    }

    #[test]
    fn test_unwanted_columns_are_never_decoded() {
        let decode = |_: usize, name: &str| match name {
            "id" => Ok(Value::Integer(1)),
            other => Err(SqldError::scan(other, "unsupported column type uuid")),
        };

        let row = decode_wanted(["id", "tag"], &ColumnSet::only(["id"]), decode).unwrap();
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("id"), Some(&Value::Integer(1)));
        assert_eq!(row.get("tag"), None);

        let err = decode_wanted(["id", "tag"], &ColumnSet::All, decode).unwrap_err();
        assert!(err.to_string().contains("tag"));
    }
}
