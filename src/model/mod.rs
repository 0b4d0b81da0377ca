//! Model declarations.
//!
//! A [`Model`] is the per-type description a record is bound to: table,
//! keys, relations, scopes, casts, projection rules and lifecycle hooks.
//! Records hold it as a shared [`ModelRef`], so one declaration serves
//! every row of the table.
//!
//! # Example
//!
//! ```no_run
//! use tidepool::{Model, Relation};
//!
//! #[derive(Default)]
//! struct User;
//!
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
//!
//!     fn relation(&self, name: &str) -> Option<Relation> {
//!         match name {
//!             "user" => Some(Relation::belongs_to(User)),
//!             _ => None,
//!         }
//!     }
//! }
//! ```

pub mod registry;

use std::sync::Arc;

use convert_case::{Case, Casing};
use sea_query::Value;

use crate::error::{OrmError, OrmResult};
use crate::query::RecordQuery;
use crate::record::Columns;
use crate::relation::Relation;
use crate::value::Cast;

pub use registry::ModelRegistry;

/// Shared handle to a model declaration.
pub type ModelRef = Arc<dyn Model>;

/// Named, reusable query modifier registered with a model.
pub type Scope = for<'a> fn(RecordQuery<'a>, &[Value]) -> RecordQuery<'a>;

/// Column stamped on insert for models with timestamps.
pub const CREATED_AT: &str = "created_at";
/// Column stamped on insert and every update for models with timestamps.
pub const UPDATED_AT: &str = "updated_at";

/// How a new record obtains its primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// The database assigns it (serial / auto increment).
    #[default]
    Incrementing,
    /// A random v4 uuid generated before the insert.
    Uuid,
    /// [`Model::generate_primary_key`] supplies it.
    Custom,
    /// The caller always sets it.
    None,
}

/// Per-type declaration of a mapped table.
///
/// Only [`Model::table_name`] is required; every other method has the
/// conventional default.
pub trait Model: Send + Sync + 'static {
    fn table_name(&self) -> &str;

    /// Identifier stored in polymorphic discriminator columns and used as
    /// the registry key.
    fn type_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn primary_key(&self) -> &str {
        "id"
    }

    fn key_strategy(&self) -> KeyStrategy {
        KeyStrategy::Incrementing
    }

    /// Key for [`KeyStrategy::Custom`] models.
    ///
    /// # Errors
    ///
    /// The default fails with [`OrmError::NotImplemented`].
    fn generate_primary_key(&self) -> OrmResult<Value> {
        Err(OrmError::NotImplemented(format!(
            "{} declares a custom key strategy but does not override generate_primary_key",
            self.type_name()
        )))
    }

    /// Integer column compared on update and delete; enables optimistic locking.
    fn lock_column(&self) -> Option<&str> {
        None
    }

    /// Read-only models reject insert, update and delete.
    fn read_only(&self) -> bool {
        false
    }

    /// Mass-assignment allow-list. `None` allows every column.
    fn fillable(&self) -> Option<&[&str]> {
        None
    }

    /// Columns left out of array/JSON projections.
    fn protected(&self) -> &[&str] {
        &[]
    }

    /// Relations eagerly loaded by every query unless excluded.
    fn includes(&self) -> &[&str] {
        &[]
    }

    /// Relation declared under `name`.
    fn relation(&self, _name: &str) -> Option<Relation> {
        None
    }

    fn is_relation(&self, name: &str) -> bool {
        self.relation(name).is_some()
    }

    /// Transform applied when a column is read without `raw`.
    fn accessor(&self, _column: &str, value: Value) -> Value {
        value
    }

    /// Whether [`accessor`](Self::accessor) produces `column` even when no
    /// value is stored under it. Such a computed column receives a null.
    fn has_accessor(&self, _column: &str) -> bool {
        false
    }

    /// Transform applied when a column is written without `raw`.
    fn mutator(&self, _column: &str, value: Value) -> Value {
        value
    }

    fn cast(&self, _column: &str) -> Option<Cast> {
        None
    }

    /// Scopes, collected once when the model is registered.
    fn scopes(&self) -> Vec<(&'static str, Scope)> {
        Vec::new()
    }

    /// Stamp [`CREATED_AT`] / [`UPDATED_AT`].
    fn timestamps(&self) -> bool {
        false
    }

    /// Columns where an empty string is stored as `NULL`.
    fn nullable(&self) -> &[&str] {
        &[]
    }

    /// Belongs-to relations whose parent gets its [`UPDATED_AT`] bumped
    /// whenever this record is saved.
    fn touches(&self) -> &[&str] {
        &[]
    }

    fn before_insert(&self, _columns: &mut Columns) -> OrmResult<()> {
        Ok(())
    }

    fn after_insert(&self, _columns: &Columns) -> OrmResult<()> {
        Ok(())
    }

    fn before_update(&self, _columns: &mut Columns) -> OrmResult<()> {
        Ok(())
    }

    fn after_update(&self, _columns: &Columns, _affected: u64) -> OrmResult<()> {
        Ok(())
    }

    fn before_delete(&self) -> OrmResult<()> {
        Ok(())
    }

    fn after_delete(&self, _affected: u64) -> OrmResult<()> {
        Ok(())
    }
}

/// Last path segment of a type name: `app::models::BlogPost` -> `BlogPost`.
pub fn short_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

/// `BlogPost` -> `blog_post`.
pub fn snake_name(model: &dyn Model) -> String {
    short_name(model.type_name()).to_case(Case::Snake)
}

/// Conventional foreign key pointing at `model`: `blog_post_id`.
pub fn default_foreign_key(model: &dyn Model) -> String {
    format!("{}_{}", snake_name(model), model.primary_key())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct BlogPost;

    impl Model for BlogPost {
        fn table_name(&self) -> &str {
            "blog_posts"
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(short_name("app::models::BlogPost"), "BlogPost");
        assert_eq!(short_name("Wrapper<app::Inner>"), "Wrapper");
        assert_eq!(snake_name(&BlogPost), "blog_post");
        assert_eq!(default_foreign_key(&BlogPost), "blog_post_id");
    }

    #[test]
    fn test_defaults() {
        let model = BlogPost;
        assert!(model.type_name().ends_with("BlogPost"));
        assert_eq!(model.primary_key(), "id");
        assert_eq!(model.key_strategy(), KeyStrategy::Incrementing);
        assert!(model.lock_column().is_none());
        assert!(model.fillable().is_none());
        assert!(!model.is_relation("anything"));
        assert!(matches!(
            model.generate_primary_key(),
            Err(OrmError::NotImplemented(_))
        ));
    }
}
