//! Relation descriptors - how two models relate.
//!
//! A [`Relation`] is built on demand by [`Model::relation`] and carries
//! everything needed to resolve it: kind, related model, key columns,
//! junction table for many-to-many and the discriminator for polymorphic
//! kinds. Resolution lives in [`resolver`], batching in [`eager`],
//! correlated counts in [`count`] and junction maintenance in [`junction`].
//!
//! Key columns per kind:
//!
//! | kind | `foreign_key` | `local_key` |
//! |---|---|---|
//! | belongs-to (+ polymorphic) | column on the owner | referenced column on the related model |
//! | has-one / has-many (+ polymorphic) | column on the related model | referenced column on the owner |
//! | many-to-many | referenced column on the related model | referenced column on the owner |
//!
//! Many-to-many keys inside the junction table are `near_key` (points at the
//! owner) and `far_key` (points at the related model).

pub mod count;
pub mod eager;
pub mod junction;
pub mod resolver;

use std::fmt;
use std::sync::Arc;

use crate::model::{default_foreign_key, snake_name, Model, ModelRef};

pub use eager::EagerPlan;
pub use junction::SyncChanges;

/// Relationship kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
    ManyToMany,
    BelongsToPolymorphic,
    HasOnePolymorphic,
    HasManyPolymorphic,
}

impl RelationKind {
    /// Resolves to a result set rather than a single record.
    pub fn is_collection(self) -> bool {
        matches!(
            self,
            RelationKind::HasMany | RelationKind::ManyToMany | RelationKind::HasManyPolymorphic
        )
    }

    /// The owner holds the foreign key.
    pub fn is_belongs_to(self) -> bool {
        matches!(
            self,
            RelationKind::BelongsTo | RelationKind::BelongsToPolymorphic
        )
    }

    pub fn is_polymorphic(self) -> bool {
        matches!(
            self,
            RelationKind::BelongsToPolymorphic
                | RelationKind::HasOnePolymorphic
                | RelationKind::HasManyPolymorphic
        )
    }
}

/// Junction table of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Junction {
    pub table: String,
    pub near_key: String,
    pub far_key: String,
}

/// Discriminator of a polymorphic relation: the column and the type
/// identifier it must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Morph {
    pub column: String,
    pub type_name: String,
}

/// Resolved relation descriptor.
#[derive(Clone)]
pub struct Relation {
    kind: RelationKind,
    related: ModelRef,
    foreign_key: String,
    local_key: String,
    junction: Option<Junction>,
    morph: Option<Morph>,
}

impl Relation {
    /// The owner holds `<related>_id` pointing at the related primary key.
    pub fn belongs_to(related: impl Model) -> Self {
        let related: ModelRef = Arc::new(related);
        Self {
            kind: RelationKind::BelongsTo,
            foreign_key: default_foreign_key(related.as_ref()),
            local_key: related.primary_key().to_owned(),
            related,
            junction: None,
            morph: None,
        }
    }

    /// The related model holds `<owner>_id`; at most one row per owner.
    pub fn has_one(owner: &dyn Model, related: impl Model) -> Self {
        Self::owned(RelationKind::HasOne, owner, related)
    }

    /// The related model holds `<owner>_id`.
    pub fn has_many(owner: &dyn Model, related: impl Model) -> Self {
        Self::owned(RelationKind::HasMany, owner, related)
    }

    /// Linked through a junction table named after both models in
    /// alphabetical order (`article_tag`).
    pub fn many_to_many(owner: &dyn Model, related: impl Model) -> Self {
        let related: ModelRef = Arc::new(related);
        let mut names = [snake_name(owner), snake_name(related.as_ref())];
        names.sort();
        Self {
            kind: RelationKind::ManyToMany,
            foreign_key: related.primary_key().to_owned(),
            local_key: owner.primary_key().to_owned(),
            junction: Some(Junction {
                table: names.join("_"),
                near_key: default_foreign_key(owner),
                far_key: default_foreign_key(related.as_ref()),
            }),
            related,
            morph: None,
        }
    }

    /// The owner holds `<name>_id` and `<name>_type`; only rows whose type
    /// column names `related` resolve.
    pub fn belongs_to_polymorphic(related: impl Model, name: &str) -> Self {
        let related: ModelRef = Arc::new(related);
        Self {
            kind: RelationKind::BelongsToPolymorphic,
            foreign_key: format!("{name}_id"),
            local_key: related.primary_key().to_owned(),
            junction: None,
            morph: Some(Morph {
                column: format!("{name}_type"),
                type_name: related.type_name().to_owned(),
            }),
            related,
        }
    }

    /// The related model holds `<name>_id` and `<name>_type` naming the owner.
    pub fn has_one_polymorphic(owner: &dyn Model, related: impl Model, name: &str) -> Self {
        Self::morphed(RelationKind::HasOnePolymorphic, owner, related, name)
    }

    /// The related model holds `<name>_id` and `<name>_type` naming the owner.
    pub fn has_many_polymorphic(owner: &dyn Model, related: impl Model, name: &str) -> Self {
        Self::morphed(RelationKind::HasManyPolymorphic, owner, related, name)
    }

    fn owned(kind: RelationKind, owner: &dyn Model, related: impl Model) -> Self {
        Self {
            kind,
            related: Arc::new(related),
            foreign_key: default_foreign_key(owner),
            local_key: owner.primary_key().to_owned(),
            junction: None,
            morph: None,
        }
    }

    fn morphed(kind: RelationKind, owner: &dyn Model, related: impl Model, name: &str) -> Self {
        Self {
            kind,
            related: Arc::new(related),
            foreign_key: format!("{name}_id"),
            local_key: owner.primary_key().to_owned(),
            junction: None,
            morph: Some(Morph {
                column: format!("{name}_type"),
                type_name: owner.type_name().to_owned(),
            }),
        }
    }

    pub fn with_foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = column.into();
        self
    }

    pub fn with_local_key(mut self, column: impl Into<String>) -> Self {
        self.local_key = column.into();
        self
    }

    /// Override the junction table and its two key columns.
    pub fn with_junction(
        mut self,
        table: impl Into<String>,
        near_key: impl Into<String>,
        far_key: impl Into<String>,
    ) -> Self {
        self.junction = Some(Junction {
            table: table.into(),
            near_key: near_key.into(),
            far_key: far_key.into(),
        });
        self
    }

    /// Override the discriminator column name.
    pub fn with_morph_column(mut self, column: impl Into<String>) -> Self {
        if let Some(morph) = self.morph.as_mut() {
            morph.column = column.into();
        }
        self
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn related(&self) -> &ModelRef {
        &self.related
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    pub fn junction(&self) -> Option<&Junction> {
        self.junction.as_ref()
    }

    pub fn morph(&self) -> Option<&Morph> {
        self.morph.as_ref()
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("kind", &self.kind)
            .field("related", &self.related.table_name())
            .field("foreign_key", &self.foreign_key)
            .field("local_key", &self.local_key)
            .field("junction", &self.junction)
            .field("morph", &self.morph)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct User;
    #[derive(Default)]
    struct Article;
    #[derive(Default)]
    struct Tag;
    #[derive(Default)]
    struct Comment;

    impl Model for User {
        fn table_name(&self) -> &str {
            "users"
        }
    }
    impl Model for Article {
        fn table_name(&self) -> &str {
            "articles"
        }
    }
    impl Model for Tag {
        fn table_name(&self) -> &str {
            "tags"
        }
    }
    impl Model for Comment {
        fn table_name(&self) -> &str {
            "comments"
        }
    }

    #[test]
    fn test_default_keys() {
        let belongs = Relation::belongs_to(User);
        assert_eq!(belongs.kind(), RelationKind::BelongsTo);
        assert_eq!(belongs.foreign_key(), "user_id");
        assert_eq!(belongs.local_key(), "id");

        let many = Relation::has_many(&User, Article);
        assert_eq!(many.foreign_key(), "user_id");
        assert_eq!(many.local_key(), "id");
        assert!(many.kind().is_collection());
        assert_eq!(many.related().table_name(), "articles");
    }

    #[test]
    fn test_many_to_many_junction_naming() {
        let rel = Relation::many_to_many(&Tag, Article);
        let junction = rel.junction().expect("junction");
        assert_eq!(junction.table, "article_tag");
        assert_eq!(junction.near_key, "tag_id");
        assert_eq!(junction.far_key, "article_id");
        assert_eq!(rel.foreign_key(), "id");
    }

    #[test]
    fn test_polymorphic_discriminators() {
        let rel = Relation::has_many_polymorphic(&Article, Comment, "commentable");
        let morph = rel.morph().expect("morph");
        assert_eq!(rel.foreign_key(), "commentable_id");
        assert_eq!(morph.column, "commentable_type");
        assert!(morph.type_name.ends_with("Article"));

        let back = Relation::belongs_to_polymorphic(Article, "commentable");
        assert!(back.kind().is_belongs_to());
        assert!(back.kind().is_polymorphic());
        assert!(back.morph().expect("morph").type_name.ends_with("Article"));
    }

    #[test]
    fn test_overrides() {
        let rel = Relation::has_many(&User, Article)
            .with_foreign_key("author_id")
            .with_local_key("uuid");
        assert_eq!(rel.foreign_key(), "author_id");
        assert_eq!(rel.local_key(), "uuid");

        let rel = Relation::many_to_many(&User, Tag).with_junction("taggings", "owner_id", "label_id");
        assert_eq!(rel.junction().map(|j| j.table.as_str()), Some("taggings"));
    }
}
