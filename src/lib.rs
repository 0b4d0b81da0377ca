//! # Tidepool
//!
//! Active-record ORM engine over sea-query.
//!
//! Models are declared with the [`Model`] trait; rows come back as
//! [`Record`]s that track their own modifications, resolve relations lazily
//! or in batches, and write through optimistic locking when the model has a
//! lock column. Statements go through a [`LifeExecutor`], so the engine runs
//! the same against PostgreSQL, a scripted [`MockExecutor`], or any other
//! driver that can take SQL text and bound values.
//!
//! ```no_run
//! use tidepool::{Database, MockExecutor, Model, Relation};
//!
//! #[derive(Default)]
//! struct User;
//! #[derive(Default)]
//! struct Article;
//!
//! impl Model for User {
//!     fn table_name(&self) -> &str {
//!         "users"
//!     }
//!
//!     fn relation(&self, name: &str) -> Option<Relation> {
//!         match name {
//!             "articles" => Some(Relation::has_many(self, Article)),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! impl Model for Article {
//!     fn table_name(&self) -> &str {
//!         "articles"
//!     }
//! }
//!
//! let db = Database::new(MockExecutor::default());
//! // two statements whatever the number of users
//! let users = db.query::<User>().including(["articles"]).all()?;
//! # Ok::<(), tidepool::OrmError>(())
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod mock;
pub mod model;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod query;
pub mod record;
pub mod relation;
pub mod result_set;
pub mod value;

pub use config::DatabaseConfig;
#[cfg(feature = "postgres")]
pub use connection::connect;
pub use connection::{Database, Statement};
pub use error::{OrmError, OrmResult};
pub use executor::{Backend, LifeError, LifeExecutor, Row};
pub use mock::{MockExecResult, MockExecutor};
pub use model::{KeyStrategy, Model, ModelRef, ModelRegistry, Scope};
pub use query::{Include, Includes, RecordQuery, RelationFilter};
pub use record::{Attribute, Columns, Record, Related};
pub use relation::{Relation, RelationKind, SyncChanges};
pub use result_set::ResultSet;
pub use value::Cast;

pub use sea_query;
