//! Lazy resolution, polymorphic relations, junction maintenance and
//! writes through relations.

mod common;

use common::*;
use tidepool::sea_query::{Order, Value};
use tidepool::{
    row, Attribute, Backend, MockExecResult, Model, OrmError, Related, Relation, SyncChanges,
};

/// A legacy `author` column sits next to the `author` relation; `headline`
/// exists only through the accessor.
#[derive(Default)]
struct Post;

impl Model for Post {
    fn table_name(&self) -> &str {
        "posts"
    }

    fn relation(&self, name: &str) -> Option<Relation> {
        (name == "author").then(|| Relation::belongs_to(User))
    }

    fn accessor(&self, column: &str, value: Value) -> Value {
        match (column, value) {
            ("title", Value::String(Some(title))) => Value::from(title.to_uppercase()),
            ("headline", _) => Value::from("untitled"),
            (_, value) => value,
        }
    }

    fn has_accessor(&self, column: &str) -> bool {
        column == "headline"
    }
}

// ============================================================================
// Lazy loading
// ============================================================================

#[test]
fn test_lazy_has_many_loads_once() {
    let (mock, db) = setup(Backend::Postgres);
    mock.append_query_results([vec![
        row! { "id" => 10, "user_id" => 1 },
        row! { "id" => 11, "user_id" => 1 },
    ]]);

    let mut user = loaded::<User>(row! { "id" => 1, "name" => "Ada" });
    let count = user
        .load(&db, "articles")
        .expect("load")
        .as_many()
        .map(|set| set.len());
    assert_eq!(count, Some(2));

    user.load(&db, "articles").expect("cached");
    assert_eq!(
        mock.sql(),
        vec![r#"SELECT * FROM "articles" WHERE "articles"."user_id" IN ($1)"#]
    );
}

#[test]
fn test_null_foreign_key_resolves_without_query() {
    let (mock, db) = setup(Backend::Postgres);
    let mut comment = loaded::<Comment>(row! { "id" => 1, "user_id" => Value::Int(None) });

    let author = comment.get_column(&db, "author", false).expect("author");
    assert!(matches!(author, Attribute::One(None)));
    assert_eq!(mock.statement_count(), 0);
}

#[test]
fn test_get_column_dispatch() {
    let (mock, db) = setup(Backend::Postgres);
    mock.append_query_results([vec![row! { "id" => 3, "user_id" => 1, "bio" => "hi" }]]);
    let mut user = loaded::<User>(row! { "id" => 1, "name" => "Ada" });

    let name = user.get_column(&db, "name", false).expect("column").into_value();
    assert_eq!(name, Some(Value::from("Ada")));
    assert!(user.get_column(&db, "nothing", false).expect("absent").is_absent());
    assert_eq!(mock.statement_count(), 0);

    match user.get_column(&db, "profile", false).expect("profile") {
        Attribute::One(Some(profile)) => assert_eq!(profile.raw("bio"), Some(&Value::from("hi"))),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(mock.statement_count(), 1);
    assert!(user.related("profile").is_some());
}

#[test]
fn test_relation_wins_over_stored_column() {
    let (mock, db) = setup(Backend::Postgres);
    mock.append_query_results([vec![row! { "id" => 1, "name" => "Ada" }]]);
    let mut post = loaded::<Post>(row! { "id" => 3, "author" => "legacy text", "user_id" => 1 });

    match post.get_column(&db, "author", false).expect("author") {
        Attribute::One(Some(author)) => assert_eq!(author.raw("name"), Some(&Value::from("Ada"))),
        other => panic!("unexpected {other:?}"),
    }
    let cached = post.get_column(&db, "author", true).expect("cached");
    assert!(matches!(cached, Attribute::One(Some(_))));
    assert_eq!(
        mock.sql(),
        vec![r#"SELECT * FROM "users" WHERE "users"."id" IN ($1)"#]
    );
    assert_eq!(post.raw("author"), Some(&Value::from("legacy text")));
}

#[test]
fn test_accessor_applies_unless_raw() {
    let (mock, db) = setup(Backend::Postgres);
    let mut post = loaded::<Post>(row! { "id" => 3, "title" => "engines" });

    let title = post.get_column(&db, "title", false).expect("title").into_value();
    assert_eq!(title, Some(Value::from("ENGINES")));
    let title = post.get_column(&db, "title", true).expect("raw title").into_value();
    assert_eq!(title, Some(Value::from("engines")));

    let headline = post.get_column(&db, "headline", false).expect("headline").into_value();
    assert_eq!(headline, Some(Value::from("untitled")));
    assert!(post.get_column(&db, "headline", true).expect("raw headline").is_absent());
    assert!(post.attribute("headline").into_value().is_some());
    assert_eq!(mock.statement_count(), 0);
}

#[test]
fn test_unknown_relation_on_load() {
    let (_, db) = setup(Backend::Postgres);
    let mut user = loaded::<User>(row! { "id" => 1 });
    let err = user.load(&db, "friends").unwrap_err();
    assert!(matches!(err, OrmError::UnknownRelation { .. }));
}

// ============================================================================
// Polymorphic
// ============================================================================

#[test]
fn test_polymorphic_has_many_filters_on_type() {
    let (mock, db) = setup(Backend::Postgres);
    mock.append_query_results([vec![row! {
        "id" => 5,
        "commentable_id" => 10,
        "commentable_type" => "Article",
        "user_id" => Value::Int(None)
    }]]);

    let mut article = loaded::<Article>(row! { "id" => 10 });
    let comments = article.load(&db, "comments").expect("comments");
    assert_eq!(comments.as_many().map(|set| set.len()), Some(1));

    let statements = mock.statements();
    assert_eq!(
        statements[0].sql,
        r#"SELECT * FROM "comments" WHERE "comments"."commentable_id" IN ($1) AND "comments"."commentable_type" = $2"#
    );
    assert_eq!(
        statements[0].values.0,
        vec![Value::from(10), Value::from("Article")]
    );
}

#[test]
fn test_polymorphic_belongs_to_other_type_is_none() {
    let (mock, db) = setup(Backend::Postgres);
    let mut comment = loaded::<Comment>(row! {
        "id" => 5,
        "commentable_id" => 10,
        "commentable_type" => "Video"
    });

    let parent = comment.load(&db, "commentable").expect("commentable");
    assert!(matches!(parent, Related::One(None)));
    assert_eq!(mock.statement_count(), 0);
}

#[test]
fn test_polymorphic_belongs_to_resolves_matching_type() {
    let (mock, db) = setup(Backend::Postgres);
    mock.append_query_results([vec![row! { "id" => 10, "title" => "Engines" }]]);
    let mut comment = loaded::<Comment>(row! {
        "id" => 5,
        "commentable_id" => 10,
        "commentable_type" => "Article"
    });

    let parent = comment.load(&db, "commentable").expect("commentable");
    let title = parent.as_one().and_then(|article| article.raw("title")).cloned();
    assert_eq!(title, Some(Value::from("Engines")));
    assert_eq!(
        mock.sql(),
        vec![r#"SELECT * FROM "articles" WHERE "articles"."id" IN ($1)"#]
    );
}

#[test]
fn test_saving_child_touches_owner() {
    let (mock, db) = setup(Backend::Postgres);
    mock.append_query_results([vec![row! { "id" => 5 }]]);

    let mut comment = db.record::<Comment>();
    comment
        .set("body", "first")
        .set("commentable_id", 10)
        .set("commentable_type", "Article");
    comment.save(&db).expect("save");

    let statements = mock.statements();
    assert_eq!(statements.len(), 2);
    assert_eq!(
        statements[1].sql,
        r#"UPDATE "articles" SET "updated_at" = $1 WHERE "articles"."id" = $2"#
    );
    assert!(matches!(statements[1].values.0[0], Value::ChronoDateTime(Some(_))));
    assert_eq!(statements[1].values.0[1], Value::from(10));
}

// ============================================================================
// Writes through relations
// ============================================================================

#[test]
fn test_create_related_sets_foreign_key() {
    let (mock, db) = setup(Backend::Postgres);
    mock.append_query_results([vec![row! { "id" => 20 }]]);

    let user = loaded::<User>(row! { "id" => 1 });
    let mut article = db.record::<Article>();
    article.set("title", "Engines");
    user.create_related(&db, "articles", &mut article).expect("create");

    assert_eq!(article.raw("user_id"), Some(&Value::from(1)));
    assert_eq!(article.key(), Some(&Value::from(20)));
    assert_eq!(
        mock.sql()[0],
        r#"INSERT INTO "articles" ("created_at", "title", "updated_at", "user_id") VALUES ($1, $2, $3, $4) RETURNING "id""#
    );
}

#[test]
fn test_create_related_through_junction() {
    let (mock, db) = setup(Backend::Postgres);
    mock.append_query_results([vec![row! { "id" => 100 }]]);
    mock.append_exec_results([MockExecResult::affected(1)]);

    let article = loaded::<Article>(row! { "id" => 10 });
    let mut tag = db.record::<Tag>();
    tag.set("name", "rust");
    article.create_related(&db, "tags", &mut tag).expect("create");

    let statements = mock.statements();
    assert_eq!(
        statements[0].sql,
        r#"INSERT INTO "tags" ("name") VALUES ($1) RETURNING "id""#
    );
    assert_eq!(
        statements[1].sql,
        r#"INSERT INTO "article_tag" ("article_id", "tag_id") VALUES ($1, $2)"#
    );
    assert_eq!(statements[1].values.0, vec![Value::from(10), Value::from(100)]);
}

#[test]
fn test_create_related_rejects_belongs_to() {
    let (mock, db) = setup(Backend::Postgres);
    let article = loaded::<Article>(row! { "id" => 10, "user_id" => 1 });
    let mut user = db.record::<User>();

    let err = article.create_related(&db, "user", &mut user).unwrap_err();
    assert!(matches!(err, OrmError::InvalidRelation { .. }));
    assert_eq!(mock.statement_count(), 0);
}

#[test]
fn test_link_and_unlink() {
    let (mock, db) = setup(Backend::Postgres);
    mock.append_exec_results([MockExecResult::affected(2), MockExecResult::affected(1)]);
    let article = loaded::<Article>(row! { "id" => 10 });

    assert_eq!(article.link(&db, "tags", [1, 2]).expect("link"), 2);
    assert_eq!(article.unlink(&db, "tags", [2]).expect("unlink"), 1);
    assert_eq!(article.link(&db, "tags", Vec::<i32>::new()).expect("noop"), 0);

    assert_eq!(
        mock.sql(),
        vec![
            r#"INSERT INTO "article_tag" ("article_id", "tag_id") VALUES ($1, $2), ($3, $4)"#,
            r#"DELETE FROM "article_tag" WHERE "article_tag"."article_id" = $1 AND "article_tag"."tag_id" IN ($2)"#,
        ]
    );
}

#[test]
fn test_link_requires_junction() {
    let (_, db) = setup(Backend::Postgres);
    let user = loaded::<User>(row! { "id" => 1 });
    let err = user.link(&db, "articles", [1]).unwrap_err();
    assert!(matches!(err, OrmError::InvalidRelation { .. }));
}

#[test]
fn test_synchronize_diffs_junction() {
    let (mock, db) = setup(Backend::Postgres);
    mock.append_query_results([vec![row! { "tag_id" => 1 }, row! { "tag_id" => 2 }]]);
    mock.append_exec_results([MockExecResult::affected(1), MockExecResult::affected(1)]);
    let article = loaded::<Article>(row! { "id" => 10 });

    let changes = article.synchronize(&db, "tags", [2, 3]).expect("sync");
    assert_eq!(
        changes,
        SyncChanges {
            attached: vec![Value::from(3)],
            detached: vec![Value::from(1)],
        }
    );

    assert_eq!(
        mock.sql(),
        vec![
            r#"SELECT "tag_id" FROM "article_tag" WHERE "article_tag"."article_id" = $1"#,
            r#"DELETE FROM "article_tag" WHERE "article_tag"."article_id" = $1 AND "article_tag"."tag_id" IN ($2)"#,
            r#"INSERT INTO "article_tag" ("article_id", "tag_id") VALUES ($1, $2)"#,
        ]
    );
}

#[test]
fn test_synchronize_unchanged_only_reads() {
    let (mock, db) = setup(Backend::Postgres);
    mock.append_query_results([vec![row! { "tag_id" => 1 }]]);
    let article = loaded::<Article>(row! { "id" => 10 });

    let changes = article.synchronize(&db, "tags", ["1"]).expect("sync");
    assert_eq!(changes, SyncChanges::default());
    assert_eq!(mock.statement_count(), 1);
}

// ============================================================================
// Scopes, counts, projection
// ============================================================================

#[test]
fn test_registered_scope() {
    let (mock, db) = setup(Backend::Postgres);
    db.query::<Article>()
        .scope("published", &[])
        .expect("scope")
        .order_by("id", Order::Desc)
        .all()
        .expect("articles");

    assert_eq!(
        mock.sql(),
        vec![r#"SELECT * FROM "articles" WHERE "articles"."published" = $1 ORDER BY "articles"."id" DESC"#]
    );
}

#[test]
fn test_undefined_scope() {
    let (mock, db) = setup(Backend::Postgres);
    let err = db.query::<Tag>().scope("published", &[]).unwrap_err();
    assert!(matches!(err, OrmError::UndefinedScope { ref scope, .. } if scope == "published"));
    assert_eq!(mock.statement_count(), 0);
}

#[test]
fn test_first_or_fail() {
    let (_, db) = setup(Backend::Postgres);
    let err = db.query::<User>().first_or_fail().unwrap_err();
    assert!(matches!(err, OrmError::NotFound { ref table } if table == "users"));
}

#[test]
fn test_json_projection_includes_relations() {
    let (mock, db) = setup(Backend::Postgres);
    mock.append_query_results([
        vec![row! { "id" => 1, "name" => "Ada", "password" => "secret" }],
        vec![row! { "id" => 10, "user_id" => 1, "title" => "Engines" }],
    ]);

    let users = db.query::<User>().including(["articles"]).all().expect("users");
    let json = users.to_json(true, false);

    assert_eq!(json[0]["name"], "Ada");
    assert!(json[0].get("password").is_none());
    assert_eq!(json[0]["articles"][0]["title"], "Engines");
}
