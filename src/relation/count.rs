//! Correlated `COUNT(*)` subqueries for `with_count_of`.

use sea_query::{Alias, Asterisk, Expr, Func, Query, SimpleExpr};

use super::{Relation, RelationKind};
use crate::query::col;

impl Relation {
    /// `(SELECT COUNT(*) FROM related WHERE related.fk = owner.key)`,
    /// correlated against `owner_table`.
    pub fn count_subquery(&self, owner_table: &str) -> SimpleExpr {
        let related = self.related.table_name();
        let mut sub = Query::select();
        sub.expr(Func::count(Expr::col(Asterisk)));

        match (&self.junction, self.kind) {
            (Some(junction), RelationKind::ManyToMany) => {
                sub.from(Alias::new(&junction.table)).and_where(
                    col(&junction.table, &junction.near_key)
                        .equals((Alias::new(owner_table), Alias::new(&self.local_key))),
                );
            }
            _ if self.kind.is_belongs_to() => {
                sub.from(Alias::new(related)).and_where(
                    col(related, &self.local_key)
                        .equals((Alias::new(owner_table), Alias::new(&self.foreign_key))),
                );
                if let Some(morph) = &self.morph {
                    sub.and_where(col(owner_table, &morph.column).eq(morph.type_name.as_str()));
                }
            }
            _ => {
                sub.from(Alias::new(related)).and_where(
                    col(related, &self.foreign_key)
                        .equals((Alias::new(owner_table), Alias::new(&self.local_key))),
                );
                if let Some(morph) = &self.morph {
                    sub.and_where(col(related, &morph.column).eq(morph.type_name.as_str()));
                }
            }
        }

        SimpleExpr::SubQuery(None, Box::new(sub.into_sub_query_statement()))
    }
}

#[cfg(test)]
mod tests {
    use sea_query::{PostgresQueryBuilder, Query};

    use super::*;
    use crate::model::Model;

    struct User;
    struct Article;
    struct Tag;

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

    fn render(expr: SimpleExpr) -> String {
        Query::select()
            .expr_as(expr, Alias::new("n"))
            .from(Alias::new("users"))
            .to_string(PostgresQueryBuilder)
    }

    #[test]
    fn test_has_many_count_is_correlated() {
        let sql = render(Relation::has_many(&User, Article).count_subquery("users"));
        assert_eq!(
            sql,
            r#"SELECT (SELECT COUNT(*) FROM "articles" WHERE "articles"."user_id" = "users"."id") AS "n" FROM "users""#
        );
    }

    #[test]
    fn test_many_to_many_counts_junction_rows() {
        let sql = render(Relation::many_to_many(&User, Tag).count_subquery("users"));
        assert!(sql.contains(r#"FROM "tag_user" WHERE "tag_user"."user_id" = "users"."id""#));
    }
}
