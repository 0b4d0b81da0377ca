//! `LifeExecutor` - the connection collaborator.
//!
//! The ORM never talks to a driver directly. Every statement is rendered by
//! sea-query for the executor's [`Backend`] and handed over as SQL text plus
//! bound [`Values`]; rows come back as ordered name/value pairs.

use sea_query::{
    MysqlQueryBuilder, PostgresQueryBuilder, QueryBuilder, SqliteQueryBuilder, Value, Values,
};
use serde::Deserialize;
use thiserror::Error;

/// `LifeExecutor` error type
#[derive(Debug, Error)]
pub enum LifeError {
    /// Driver-level error, already rendered to text
    #[error("Driver error: {0}")]
    DriverError(String),
    /// Query execution error
    #[error("Query error: {0}")]
    QueryError(String),
    /// Row parsing/conversion error
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Other execution errors
    #[error("Execution error: {0}")]
    Other(String),
}

/// SQL dialect spoken by an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Postgres,
    #[serde(alias = "mariadb")]
    MySql,
    Sqlite,
}

impl Backend {
    /// Driver name, as reported to logs and spans.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Postgres => "postgres",
            Backend::MySql => "mysql",
            Backend::Sqlite => "sqlite",
        }
    }

    pub fn query_builder(&self) -> &'static dyn QueryBuilder {
        match self {
            Backend::Postgres => &PostgresQueryBuilder,
            Backend::MySql => &MysqlQueryBuilder,
            Backend::Sqlite => &SqliteQueryBuilder,
        }
    }

    /// Whether inserts can hand back generated keys through `RETURNING`.
    /// Other dialects fall back to [`LifeExecutor::last_insert_id`].
    pub fn supports_returning(&self) -> bool {
        matches!(self, Backend::Postgres)
    }
}

/// One fetched row: column names in select order with their values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.columns.push((name.into(), value.into()));
    }

    /// Value of the named column. Later duplicates (joined tables) win.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .rev()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// Value at a position in select order.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.columns.get(index).map(|(_, value)| value)
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

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Streaming row fetch.
pub type RowStream<'a> = Box<dyn Iterator<Item = Result<Row, LifeError>> + 'a>;

/// Trait for executing database operations
///
/// This trait abstracts database execution, allowing different implementations
/// (direct client, scripted mock, pooled connection) to be used interchangeably.
/// Statements arrive already rendered for [`LifeExecutor::backend`].
///
/// # Examples
///
/// ```no_run
/// use tidepool::executor::{LifeExecutor, LifeError};
/// use sea_query::Values;
///
/// # fn example(executor: &dyn LifeExecutor) -> Result<(), LifeError> {
/// let rows = executor.query_all("SELECT id FROM users", &Values(vec![]))?;
/// let ids: Vec<_> = rows.iter().filter_map(|r| r.get("id").cloned()).collect();
/// # Ok(())
/// # }
/// ```
pub trait LifeExecutor: Send + Sync {
    /// Dialect this executor speaks; decides how statements are rendered.
    fn backend(&self) -> Backend;

    /// Execute a statement and return the number of rows affected
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the statement execution fails.
    fn execute(&self, sql: &str, values: &Values) -> Result<u64, LifeError>;

    /// Execute a query and return the first row, if any
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the query execution fails.
    fn query_one(&self, sql: &str, values: &Values) -> Result<Option<Row>, LifeError>;

    /// Execute a query and return all rows
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the query execution fails.
    fn query_all(&self, sql: &str, values: &Values) -> Result<Vec<Row>, LifeError>;

    /// Execute a query and yield rows one at a time.
    ///
    /// The default buffers through [`LifeExecutor::query_all`]; drivers with
    /// portal support override it.
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the query cannot be started.
    fn query_stream<'a>(&'a self, sql: &str, values: &Values) -> Result<RowStream<'a>, LifeError> {
        let rows = self.query_all(sql, values)?;
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    /// Key generated by the most recent insert on this connection.
    ///
    /// Only consulted for backends without `RETURNING` support.
    ///
    /// # Errors
    ///
    /// Returns `LifeError` if the driver cannot report it.
    fn last_insert_id(&self) -> Result<Value, LifeError>;
}
