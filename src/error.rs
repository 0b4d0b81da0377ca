//! Engine-level error model.
//!
//! [`LifeError`] covers the connection collaborator (driver failures, bad rows);
//! [`OrmError`] covers everything the record lifecycle, relations and query
//! bridge can refuse to do. Neither is ever retried internally.

use thiserror::Error;

use crate::executor::LifeError;

/// Result type used across the ORM layer.
pub type OrmResult<T> = Result<T, OrmError>;

/// ORM-level error.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Insert, update or delete attempted through a read-only record or model.
    #[error("record of `{table}` is read-only")]
    ReadOnlyRecord { table: String },

    /// Update or delete matched zero rows while optimistic locking was enabled.
    #[error("stale record: `{table}` row {key} was modified or deleted by another writer")]
    StaleRecord { table: String, key: String },

    /// A scope name that was never registered for the model.
    #[error("undefined scope `{scope}` on model `{model}`")]
    UndefinedScope { model: String, scope: String },

    /// A model hook that the declared behaviour requires was not overridden.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// A relation name the model does not declare.
    #[error("undefined relation `{relation}` on model `{model}`")]
    UnknownRelation { model: String, relation: String },

    /// A relation operation that does not apply to the relation kind.
    #[error("relation `{relation}` does not support {operation}")]
    InvalidRelation { relation: String, operation: String },

    /// An operation needs the primary key but the record has none.
    #[error("record of `{table}` has no value for primary key `{key}`")]
    MissingPrimaryKey { table: String, key: String },

    /// `first_or_fail` style lookups that matched nothing.
    #[error("no `{table}` record matched the query")]
    NotFound { table: String },

    /// Statement construction failed in the query builder.
    #[error("query builder error: {0}")]
    Builder(#[from] sea_query::error::Error),

    /// The connection collaborator failed.
    #[error(transparent)]
    Executor(#[from] LifeError),
}

impl OrmError {
    pub fn read_only(table: impl Into<String>) -> Self {
        Self::ReadOnlyRecord { table: table.into() }
    }

    pub fn stale(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::StaleRecord {
            table: table.into(),
            key: key.into(),
        }
    }

    pub fn unknown_relation(model: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::UnknownRelation {
            model: model.into(),
            relation: relation.into(),
        }
    }

    /// `true` for the optimistic-locking conflict, the one error callers
    /// are expected to handle by reloading.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleRecord { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = OrmError::read_only("users");
        assert_eq!(err.to_string(), "record of `users` is read-only");

        let err = OrmError::UndefinedScope {
            model: "User".into(),
            scope: "active".into(),
        };
        assert!(err.to_string().contains("undefined scope `active`"));
    }

    #[test]
    fn test_executor_errors_convert() {
        let err: OrmError = LifeError::QueryError("boom".into()).into();
        assert!(matches!(err, OrmError::Executor(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_is_stale() {
        assert!(OrmError::stale("users", "1").is_stale());
        assert!(!OrmError::read_only("users").is_stale());
    }
}
