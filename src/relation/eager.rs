//! Batched eager loading.
//!
//! Include paths are split into *direct* relations of the current model and
//! *forward* paths handed to the next level:
//!
//! ```text
//! ["user", "articles.comments", "articles.tags"]
//!   direct:  user, articles
//!   forward: articles -> [comments, tags]
//! ```
//!
//! An excluded nested path (`"articles.comments"`) is forwarded as an
//! exclusion of `comments` so it also overrides the default includes of
//! the articles' model.
//!
//! Each direct relation is fetched with one `IN (...)` query for every
//! record of the level, and its forward paths ride along on that query.
//! The number of statements therefore depends only on the shape of the
//! include tree, never on the number of records.

use std::collections::BTreeMap;

use crate::connection::Database;
use crate::error::{OrmError, OrmResult};
use crate::model::ModelRef;
use crate::query::{Include, Includes, RelationFilter};
use crate::record::Record;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// One level of an include tree.
#[derive(Debug, Default)]
pub struct EagerPlan {
    direct: Vec<Direct>,
    forward: BTreeMap<String, Includes>,
}

struct Direct {
    name: String,
    filter: Option<RelationFilter>,
}

impl std::fmt::Debug for Direct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Direct")
            .field("name", &self.name)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl EagerPlan {
    /// Split include paths on their first `.`.
    ///
    /// A nested path implies its head. An explicit head entry sets the
    /// filter for that relation; the filter of a nested path applies to
    /// its last segment one level down.
    pub fn parse(includes: &Includes) -> Self {
        let mut plan = EagerPlan::default();
        for include in includes {
            match include.path().split_once('.') {
                Some((head, rest)) => {
                    plan.direct_entry(head);
                    plan.forward
                        .entry(head.to_owned())
                        .or_default()
                        .insert(Include::from_parts(rest, include.filter().cloned()));
                }
                None => {
                    plan.direct_entry(include.path()).filter = include.filter().cloned();
                }
            }
        }
        for path in includes.excluded() {
            if let Some((head, rest)) = path.split_once('.') {
                plan.forward.entry(head.to_owned()).or_default().remove(rest);
            }
        }
        plan
    }

    fn direct_entry(&mut self, name: &str) -> &mut Direct {
        let index = match self.direct.iter().position(|d| d.name == name) {
            Some(index) => index,
            None => {
                self.direct.push(Direct {
                    name: name.to_owned(),
                    filter: None,
                });
                self.direct.len() - 1
            }
        };
        &mut self.direct[index]
    }

    /// Relations loaded at this level, in first-mention order.
    pub fn direct(&self) -> Vec<&str> {
        self.direct.iter().map(|d| d.name.as_str()).collect()
    }

    /// Paths handed to the records loaded for `relation`.
    pub fn forward(&self, relation: &str) -> Option<&Includes> {
        self.forward.get(relation)
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_empty()
    }
}

/// Resolve `includes` onto `records`, all of them instances of `model`.
///
/// Issues exactly one query per relation per level, including when
/// `records` is empty.
pub fn load(
    db: &Database,
    model: &ModelRef,
    records: &mut [Record],
    includes: &Includes,
) -> OrmResult<()> {
    let EagerPlan {
        direct,
        mut forward,
    } = EagerPlan::parse(includes);

    for Direct { name, filter } in direct {
        let relation = model
            .relation(&name)
            .ok_or_else(|| OrmError::unknown_relation(model.type_name(), &name))?;

        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::eager_span(model.table_name(), &name).entered();

        let nested = forward.remove(&name).unwrap_or_default();
        relation.eager_load(db, records, &name, filter.as_ref(), nested)?;
    }
    Ok(())
}
