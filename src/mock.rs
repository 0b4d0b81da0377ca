//! Scripted executor for tests.
//!
//! Results are queued up front and handed out in order; every statement is
//! recorded with its bound values. Mirrors the `MockDatabase` style of
//! appending query and exec results before running the code under test.
//!
//! ```
//! use std::sync::Arc;
//! use tidepool::{row, Backend, Database, MockExecutor};
//!
//! let mock = Arc::new(MockExecutor::new(Backend::Postgres));
//! mock.append_query_results([vec![row! { "id" => 1, "name" => "Ada" }]]);
//! let db = Database::from_executor(mock.clone());
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use sea_query::{Value, Values};

use crate::executor::{Backend, LifeError, LifeExecutor, Row};

/// Outcome of a non-query statement.
#[derive(Debug, Clone, PartialEq)]
pub struct MockExecResult {
    pub rows_affected: u64,
    pub last_insert_id: Option<Value>,
}

impl MockExecResult {
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            last_insert_id: None,
        }
    }

    pub fn inserted(id: impl Into<Value>) -> Self {
        Self {
            rows_affected: 1,
            last_insert_id: Some(id.into()),
        }
    }
}

/// A statement as the executor received it.
#[derive(Debug, Clone, PartialEq)]
pub struct MockStatement {
    pub sql: String,
    pub values: Values,
}

#[derive(Default)]
struct MockState {
    query_results: VecDeque<Result<Vec<Row>, LifeError>>,
    exec_results: VecDeque<Result<MockExecResult, LifeError>>,
    statements: Vec<MockStatement>,
    last_insert_id: Option<Value>,
}

pub struct MockExecutor {
    backend: Backend,
    state: Mutex<MockState>,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new(Backend::Postgres)
    }
}

impl MockExecutor {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue row sets for the next queries, one set per query.
    pub fn append_query_results<I>(&self, results: I) -> &Self
    where
        I: IntoIterator<Item = Vec<Row>>,
    {
        self.state().query_results.extend(results.into_iter().map(Ok));
        self
    }

    /// Queue outcomes for the next `execute` calls.
    pub fn append_exec_results<I>(&self, results: I) -> &Self
    where
        I: IntoIterator<Item = MockExecResult>,
    {
        self.state().exec_results.extend(results.into_iter().map(Ok));
        self
    }

    pub fn append_query_errors<I>(&self, errors: I) -> &Self
    where
        I: IntoIterator<Item = LifeError>,
    {
        self.state().query_results.extend(errors.into_iter().map(Err));
        self
    }

    pub fn append_exec_errors<I>(&self, errors: I) -> &Self
    where
        I: IntoIterator<Item = LifeError>,
    {
        self.state().exec_results.extend(errors.into_iter().map(Err));
        self
    }

    /// Every statement received so far.
    pub fn statements(&self) -> Vec<MockStatement> {
        self.state().statements.clone()
    }

    /// SQL text of every statement received so far.
    pub fn sql(&self) -> Vec<String> {
        self.state()
            .statements
            .iter()
            .map(|stmt| stmt.sql.clone())
            .collect()
    }

    pub fn statement_count(&self) -> usize {
        self.state().statements.len()
    }

    /// Statements starting with `SELECT`.
    pub fn select_count(&self) -> usize {
        self.state()
            .statements
            .iter()
            .filter(|stmt| stmt.sql.starts_with("SELECT"))
            .count()
    }

    pub fn clear_log(&self) {
        self.state().statements.clear();
    }

    fn record(&self, sql: &str, values: &Values) -> MutexGuard<'_, MockState> {
        let mut state = self.state();
        state.statements.push(MockStatement {
            sql: sql.to_owned(),
            values: values.clone(),
        });
        state
    }

    fn next_rows(&self, sql: &str, values: &Values) -> Result<Vec<Row>, LifeError> {
        self.record(sql, values)
            .query_results
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

impl LifeExecutor for MockExecutor {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn execute(&self, sql: &str, values: &Values) -> Result<u64, LifeError> {
        let mut state = self.record(sql, values);
        match state.exec_results.pop_front() {
            Some(Ok(result)) => {
                if result.last_insert_id.is_some() {
                    state.last_insert_id = result.last_insert_id;
                }
                Ok(result.rows_affected)
            }
            Some(Err(err)) => Err(err),
            None => Ok(0),
        }
    }

    fn query_one(&self, sql: &str, values: &Values) -> Result<Option<Row>, LifeError> {
        Ok(self.next_rows(sql, values)?.into_iter().next())
    }

    fn query_all(&self, sql: &str, values: &Values) -> Result<Vec<Row>, LifeError> {
        self.next_rows(sql, values)
    }

    fn last_insert_id(&self) -> Result<Value, LifeError> {
        self.state()
            .last_insert_id
            .clone()
            .ok_or_else(|| LifeError::Other("no insert id recorded".to_owned()))
    }
}

/// Build a [`Row`](crate::executor::Row) from `name => value` pairs.
#[macro_export]
macro_rules! row {
    ($($name:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut row = $crate::executor::Row::new();
        $(row.push($name, $value);)*
        row
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_are_handed_out_in_order() {
        let mock = MockExecutor::default();
        mock.append_query_results([vec![row! { "id" => 1 }], vec![]]);
        let empty = Values(Vec::new());

        assert_eq!(mock.query_all("SELECT 1", &empty).expect("rows").len(), 1);
        assert!(mock.query_one("SELECT 2", &empty).expect("row").is_none());
        assert!(mock.query_all("SELECT 3", &empty).expect("rows").is_empty());
        assert_eq!(mock.select_count(), 3);
    }

    #[test]
    fn test_exec_results_and_insert_id() {
        let mock = MockExecutor::new(Backend::MySql);
        mock.append_exec_results([MockExecResult::inserted(42), MockExecResult::affected(3)]);
        let empty = Values(Vec::new());

        assert_eq!(mock.execute("INSERT", &empty).expect("insert"), 1);
        assert_eq!(mock.last_insert_id().expect("id"), Value::from(42));
        assert_eq!(mock.execute("UPDATE", &empty).expect("update"), 3);
        assert_eq!(mock.execute("DELETE", &empty).expect("delete"), 0);
        assert_eq!(mock.sql(), vec!["INSERT", "UPDATE", "DELETE"]);
    }

    #[test]
    fn test_errors_propagate() {
        let mock = MockExecutor::default();
        mock.append_exec_errors([LifeError::DriverError("gone".into())]);
        assert!(matches!(
            mock.execute("DELETE", &Values(Vec::new())),
            Err(LifeError::DriverError(_))
        ));
    }
}
