//! Many-to-many junction maintenance: link, unlink, synchronize.

use std::collections::HashSet;

use sea_query::{Alias, Query, SimpleExpr, Value};

use super::{Junction, Relation, RelationKind};
use crate::connection::Database;
use crate::error::{OrmError, OrmResult};
use crate::query::col;
use crate::record::Record;
use crate::value::{normalize, KeyValue};

/// Junction rows touched by [`Relation::synchronize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncChanges {
    pub attached: Vec<Value>,
    pub detached: Vec<Value>,
}

impl Relation {
    /// Insert one junction row per id. Returns the number of rows written.
    pub fn link<I, V>(&self, db: &Database, owner: &Record, ids: I) -> OrmResult<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let junction = self.junction_for("link")?;
        let owner_key = self.local_value(owner)?;

        let mut stmt = Query::insert();
        stmt.into_table(Alias::new(&junction.table)).columns([
            Alias::new(&junction.near_key),
            Alias::new(&junction.far_key),
        ]);
        let mut rows = 0;
        for id in ids {
            stmt.values([
                SimpleExpr::Value(owner_key.clone()),
                SimpleExpr::Value(id.into()),
            ])?;
            rows += 1;
        }
        if rows == 0 {
            return Ok(0);
        }
        db.execute(&stmt)
    }

    /// Delete the junction rows between `owner` and the given ids.
    pub fn unlink<I, V>(&self, db: &Database, owner: &Record, ids: I) -> OrmResult<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let junction = self.junction_for("unlink")?;
        let owner_key = self.local_value(owner)?;
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let mut stmt = Query::delete();
        stmt.from_table(Alias::new(&junction.table))
            .and_where(col(&junction.table, &junction.near_key).eq(owner_key))
            .and_where(col(&junction.table, &junction.far_key).is_in(ids));
        db.execute(&stmt)
    }

    /// Make the junction hold exactly `ids` for `owner`.
    pub fn synchronize<I, V>(&self, db: &Database, owner: &Record, ids: I) -> OrmResult<SyncChanges>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let junction = self.junction_for("synchronize")?;
        let owner_key = self.local_value(owner)?;
        let wanted: Vec<Value> = ids.into_iter().map(Into::into).collect();

        let mut stmt = Query::select();
        stmt.column(Alias::new(&junction.far_key))
            .from(Alias::new(&junction.table))
            .and_where(col(&junction.table, &junction.near_key).eq(owner_key));
        let existing: Vec<Value> = db
            .query_all(&stmt)?
            .into_iter()
            .filter_map(|row| row.get(&junction.far_key).cloned())
            .collect();

        let existing_keys: HashSet<KeyValue> = existing.iter().map(normalize).collect();
        let wanted_keys: HashSet<KeyValue> = wanted.iter().map(normalize).collect();

        let detached: Vec<Value> = existing
            .into_iter()
            .filter(|value| !wanted_keys.contains(&normalize(value)))
            .collect();
        let mut seen = HashSet::new();
        let attached: Vec<Value> = wanted
            .into_iter()
            .filter(|value| {
                let key = normalize(value);
                !existing_keys.contains(&key) && seen.insert(key)
            })
            .collect();

        self.unlink(db, owner, detached.clone())?;
        self.link(db, owner, attached.clone())?;
        log::debug!(
            "synchronized {}: {} attached, {} detached",
            junction.table,
            attached.len(),
            detached.len()
        );
        Ok(SyncChanges { attached, detached })
    }

    fn junction_for(&self, operation: &str) -> OrmResult<&Junction> {
        match (&self.junction, self.kind) {
            (Some(junction), RelationKind::ManyToMany) => Ok(junction),
            _ => Err(OrmError::InvalidRelation {
                relation: self.related.table_name().to_owned(),
                operation: operation.to_owned(),
            }),
        }
    }
}
