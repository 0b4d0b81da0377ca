//! Shared models for the integration tests.
//!
//! ```text
//! User 1--* Article *--* Tag          (junction article_tag)
//! User 1--1 Profile
//! Article 1--* Comment                (polymorphic: commentable_id / commentable_type)
//! Comment *--1 User                   (author, loaded by default)
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use tidepool::sea_query::Value;
use tidepool::{
    Backend, Database, Includes, KeyStrategy, MockExecutor, Model, Record, RecordQuery, Relation,
    Row, Scope,
};

// ============================================================================
// Models
// ============================================================================

#[derive(Default)]
pub struct User;

impl Model for User {
    fn table_name(&self) -> &str {
        "users"
    }

    fn type_name(&self) -> &str {
        "User"
    }

    fn fillable(&self) -> Option<&[&str]> {
        Some(&["name", "email"])
    }

    fn protected(&self) -> &[&str] {
        &["password"]
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        match name {
            "articles" => Some(Relation::has_many(self, Article)),
            "profile" => Some(Relation::has_one(self, Profile)),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct Profile;

impl Model for Profile {
    fn table_name(&self) -> &str {
        "profiles"
    }

    fn type_name(&self) -> &str {
        "Profile"
    }
}

fn published<'a>(query: RecordQuery<'a>, _args: &[Value]) -> RecordQuery<'a> {
    query.where_eq("published", true)
}

#[derive(Default)]
pub struct Article;

impl Model for Article {
    fn table_name(&self) -> &str {
        "articles"
    }

    fn type_name(&self) -> &str {
        "Article"
    }

    fn timestamps(&self) -> bool {
        true
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        match name {
            "user" => Some(Relation::belongs_to(User)),
            "tags" => Some(Relation::many_to_many(self, Tag)),
            "comments" => Some(Relation::has_many_polymorphic(self, Comment, "commentable")),
            _ => None,
        }
    }

    fn scopes(&self) -> Vec<(&'static str, Scope)> {
        vec![("published", published as Scope)]
    }
}

#[derive(Default)]
pub struct Tag;

impl Model for Tag {
    fn table_name(&self) -> &str {
        "tags"
    }

    fn type_name(&self) -> &str {
        "Tag"
    }
}

#[derive(Default)]
pub struct Comment;

impl Model for Comment {
    fn table_name(&self) -> &str {
        "comments"
    }

    fn type_name(&self) -> &str {
        "Comment"
    }

    fn includes(&self) -> &[&str] {
        &["author"]
    }

    fn touches(&self) -> &[&str] {
        &["commentable"]
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        match name {
            "author" => Some(Relation::belongs_to(User)),
            "commentable" => Some(Relation::belongs_to_polymorphic(Article, "commentable")),
            _ => None,
        }
    }
}

/// Optimistically locked.
#[derive(Default)]
pub struct Account;

impl Model for Account {
    fn table_name(&self) -> &str {
        "accounts"
    }

    fn type_name(&self) -> &str {
        "Account"
    }

    fn lock_column(&self) -> Option<&str> {
        Some("lock_version")
    }
}

#[derive(Default)]
pub struct AuditEntry;

impl Model for AuditEntry {
    fn table_name(&self) -> &str {
        "audit_entries"
    }

    fn type_name(&self) -> &str {
        "AuditEntry"
    }

    fn read_only(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct Session;

impl Model for Session {
    fn table_name(&self) -> &str {
        "sessions"
    }

    fn type_name(&self) -> &str {
        "Session"
    }

    fn key_strategy(&self) -> KeyStrategy {
        KeyStrategy::Uuid
    }
}

#[derive(Default)]
pub struct Ticket;

impl Model for Ticket {
    fn table_name(&self) -> &str {
        "tickets"
    }

    fn type_name(&self) -> &str {
        "Ticket"
    }

    fn key_strategy(&self) -> KeyStrategy {
        KeyStrategy::Custom
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn setup(backend: Backend) -> (Arc<MockExecutor>, Database) {
    let mock = Arc::new(MockExecutor::new(backend));
    let db = Database::from_executor(mock.clone())
        .register(User)
        .register(Profile)
        .register(Article)
        .register(Tag)
        .register(Comment)
        .register(Account);
    (mock, db)
}

/// A persisted record of `M` as if fetched.
pub fn loaded<M: Model + Default>(row: Row) -> Record {
    Record::hydrate(Arc::new(M::default()), row, false, Includes::new())
}
