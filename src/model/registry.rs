//! Model registry.
//!
//! Built once while the application wires its [`Database`](crate::Database),
//! then only read. Scopes are copied out of each model at registration so
//! lookups never go back to the declaration.

use std::collections::HashMap;
use std::fmt;

use super::{ModelRef, Scope};

#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelRef>,
    scopes: HashMap<String, HashMap<String, Scope>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under its type name. Registering the same type
    /// again replaces the earlier declaration and its scopes.
    pub fn register(&mut self, model: ModelRef) {
        let type_name = model.type_name().to_owned();
        let scopes = model
            .scopes()
            .into_iter()
            .map(|(name, scope)| (name.to_owned(), scope))
            .collect();
        log::debug!("registered model {type_name} (table {})", model.table_name());
        self.scopes.insert(type_name.clone(), scopes);
        self.models.insert(type_name, model);
    }

    pub fn model(&self, type_name: &str) -> Option<&ModelRef> {
        self.models.get(type_name)
    }

    pub fn by_table(&self, table: &str) -> Option<&ModelRef> {
        self.models.values().find(|model| model.table_name() == table)
    }

    pub fn scope(&self, type_name: &str, name: &str) -> Option<Scope> {
        self.scopes.get(type_name)?.get(name).copied()
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.models.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.models.keys().collect();
        names.sort();
        f.debug_struct("ModelRegistry").field("models", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sea_query::Value;

    use super::*;
    use crate::model::Model;
    use crate::query::RecordQuery;

    struct Post;

    fn published<'a>(query: RecordQuery<'a>, _args: &[Value]) -> RecordQuery<'a> {
        query.where_eq("published", true)
    }

    impl Model for Post {
        fn table_name(&self) -> &str {
            "posts"
        }

        fn scopes(&self) -> Vec<(&'static str, Scope)> {
            vec![("published", published as Scope)]
        }
    }

    #[test]
    fn test_register_collects_scopes() {
        let mut registry = ModelRegistry::new();
        let model: ModelRef = Arc::new(Post);
        let type_name = model.type_name().to_owned();
        registry.register(model);

        assert!(registry.is_registered(&type_name));
        assert_eq!(registry.len(), 1);
        assert!(registry.scope(&type_name, "published").is_some());
        assert!(registry.scope(&type_name, "draft").is_none());
        assert!(registry.scope("Unknown", "published").is_none());
        assert_eq!(
            registry.by_table("posts").map(|m| m.type_name().to_owned()),
            Some(type_name)
        );
    }
}
