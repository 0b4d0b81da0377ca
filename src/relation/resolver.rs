//! Fetching and assigning related records.
//!
//! Every load goes through [`Relation::eager_load`]: one query for a whole
//! slice of owners, grouped back by normalized key. Lazy access is the same
//! path with a batch of one.

use std::collections::{HashMap, HashSet};

use sea_query::{Alias, Value};

use super::{Relation, RelationKind};
use crate::connection::Database;
use crate::error::{OrmError, OrmResult};
use crate::query::{col, Includes, RecordQuery, RelationFilter};
use crate::record::{Columns, Record, Related};
use crate::result_set::ResultSet;
use crate::value::{is_null, normalize, KeyValue};

/// Alias of the junction key selected next to many-to-many rows.
pub(crate) const PIVOT_KEY: &str = "__pivot_key";

const LAZY_SLOT: &str = "__lazy";

impl Relation {
    /// Resolve the relation for a single record.
    ///
    /// A record without a usable key (null foreign key, unsaved owner,
    /// polymorphic type naming another model) resolves to an empty value
    /// without touching the database.
    pub fn get_related(&self, db: &Database, record: &Record) -> OrmResult<Related> {
        if self.owner_key(record).is_none() {
            return Ok(self.empty());
        }
        let mut batch = [record.detached()];
        self.eager_load(db, &mut batch, LAZY_SLOT, None, Includes::new())?;
        let [mut loaded] = batch;
        Ok(loaded.take_related(LAZY_SLOT).unwrap_or_else(|| self.empty()))
    }

    /// Load the relation for every record with a single query and store
    /// the result under `name` on each of them.
    ///
    /// `forward` holds the nested paths to load on the fetched records.
    pub fn eager_load(
        &self,
        db: &Database,
        records: &mut [Record],
        name: &str,
        filter: Option<&RelationFilter>,
        forward: Includes,
    ) -> OrmResult<()> {
        let mut seen = HashSet::new();
        let keys: Vec<Value> = records
            .iter()
            .filter_map(|record| self.owner_key(record))
            .filter(|key| seen.insert(normalize(key)))
            .cloned()
            .collect();

        let fetched = self.fetch(db, keys, filter, forward)?;
        let groups = self.group(fetched);
        log::trace!(
            "resolved {name} on {} owner(s) into {} group(s)",
            records.len(),
            groups.len()
        );

        for record in records.iter_mut() {
            let group = self
                .owner_key(record)
                .map(normalize)
                .and_then(|key| groups.get(&key));
            let related = if self.kind.is_collection() {
                Related::Many(
                    ResultSet::new(group.cloned().unwrap_or_default())
                        .with_model(self.related.clone()),
                )
            } else {
                Related::One(group.and_then(|rows| rows.first()).cloned().map(Box::new))
            };
            record.set_related(name, related);
        }
        Ok(())
    }

    /// Save `related` as belonging to `owner`.
    ///
    /// Has-one/has-many kinds receive the owner key (and discriminator)
    /// before saving; many-to-many saves first and then adds the junction row.
    pub fn create(&self, db: &Database, owner: &Record, related: &mut Record) -> OrmResult<()> {
        match self.kind {
            RelationKind::BelongsTo | RelationKind::BelongsToPolymorphic => {
                Err(OrmError::InvalidRelation {
                    relation: self.related.table_name().to_owned(),
                    operation: "create".to_owned(),
                })
            }
            RelationKind::ManyToMany => {
                related.save(db)?;
                let key = related
                    .raw(&self.foreign_key)
                    .filter(|value| !is_null(value))
                    .cloned()
                    .ok_or_else(|| OrmError::MissingPrimaryKey {
                        table: related.table().to_owned(),
                        key: self.foreign_key.clone(),
                    })?;
                self.link(db, owner, [key])?;
                Ok(())
            }
            _ => {
                let key = self.local_value(owner)?;
                related.set_column(&self.foreign_key, key, true);
                if let Some(morph) = &self.morph {
                    related.set_column(&morph.column, morph.type_name.as_str(), true);
                }
                related.save(db)
            }
        }
    }

    /// Bump the parent's update timestamp after `child` was saved.
    pub(crate) fn touch(&self, db: &Database, child: &Record) -> OrmResult<()> {
        if !self.kind.is_belongs_to() || !self.related.timestamps() {
            return Ok(());
        }
        let Some(key) = self.owner_key(child).cloned() else {
            return Ok(());
        };
        RecordQuery::new(db, self.related.clone())
            .clear_includes()
            .where_eq(&self.local_key, key)
            .update(Columns::new())?;
        Ok(())
    }

    /// Key on the owner side used to match related rows, if usable.
    pub(crate) fn owner_key<'r>(&self, record: &'r Record) -> Option<&'r Value> {
        let key = if self.kind.is_belongs_to() {
            if let Some(morph) = &self.morph {
                let matches = matches!(
                    record.raw(&morph.column),
                    Some(Value::String(Some(name))) if name.as_str() == morph.type_name
                );
                if !matches {
                    return None;
                }
            }
            record.raw(&self.foreign_key)
        } else {
            record.raw(&self.local_key)
        };
        key.filter(|value| !is_null(value))
    }

    pub(crate) fn local_value(&self, owner: &Record) -> OrmResult<Value> {
        owner
            .raw(&self.local_key)
            .filter(|value| !is_null(value))
            .cloned()
            .ok_or_else(|| OrmError::MissingPrimaryKey {
                table: owner.table().to_owned(),
                key: self.local_key.clone(),
            })
    }

    fn fetch(
        &self,
        db: &Database,
        keys: Vec<Value>,
        filter: Option<&RelationFilter>,
        forward: Includes,
    ) -> OrmResult<ResultSet> {
        let table = self.related.table_name().to_owned();
        let mut query = db.query_model(self.related.clone());

        query = match (&self.junction, self.kind) {
            (Some(junction), RelationKind::ManyToMany) => query
                .join(
                    &junction.table,
                    col(&junction.table, &junction.far_key)
                        .equals((Alias::new(&table), Alias::new(&self.foreign_key))),
                )
                .select_also(col(&junction.table, &junction.near_key).into(), PIVOT_KEY)
                .filter(col(&junction.table, &junction.near_key).is_in(keys)),
            _ if self.kind.is_belongs_to() => {
                query.filter(col(&table, &self.local_key).is_in(keys))
            }
            _ => query.filter(col(&table, &self.foreign_key).is_in(keys)),
        };

        if let (Some(morph), false) = (&self.morph, self.kind.is_belongs_to()) {
            query = query.filter(col(&table, &morph.column).eq(morph.type_name.as_str()));
        }

        query = query.merge_includes(forward);
        if let Some(filter) = filter {
            query = (**filter)(query);
        }
        query.all()
    }

    fn group(&self, fetched: ResultSet) -> HashMap<KeyValue, Vec<Record>> {
        let column = match self.kind {
            RelationKind::ManyToMany => PIVOT_KEY,
            kind if kind.is_belongs_to() => self.local_key.as_str(),
            _ => self.foreign_key.as_str(),
        };

        let mut groups: HashMap<KeyValue, Vec<Record>> = HashMap::new();
        for mut record in fetched {
            let key = record.raw(column).map(normalize).unwrap_or(KeyValue::Null);
            if self.kind == RelationKind::ManyToMany {
                record.forget_column(PIVOT_KEY);
            }
            groups.entry(key).or_default().push(record);
        }
        groups
    }

    fn empty(&self) -> Related {
        if self.kind.is_collection() {
            Related::Many(ResultSet::default().with_model(self.related.clone()))
        } else {
            Related::One(None)
        }
    }
}
