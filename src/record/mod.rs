//! Records: one row of a model with its lifecycle.
//!
//! A [`Record`] keeps the current column values next to the values last
//! read from or written to the database. The difference between the two,
//! compared loosely, is what `save` writes. Loaded relations hang off the
//! record under their relation name.

mod locking;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use sea_query::Value;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as Json};
use uuid::Uuid;

use crate::connection::Database;
use crate::error::{OrmError, OrmResult};
use crate::executor::Row;
use crate::model::{KeyStrategy, Model, ModelRef, CREATED_AT, UPDATED_AT};
use crate::query::{Include, Includes, RecordQuery};
use crate::relation::{eager, Relation, SyncChanges};
use crate::result_set::ResultSet;
use crate::value::{from_json, is_null, loose_eq, to_json};

/// Column name to value, ordered by name.
pub type Columns = BTreeMap<String, Value>;

/// A loaded relation.
#[derive(Debug, Clone)]
pub enum Related {
    One(Option<Box<Record>>),
    Many(ResultSet),
}

impl Related {
    pub fn as_one(&self) -> Option<&Record> {
        match self {
            Related::One(record) => record.as_deref(),
            Related::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&ResultSet> {
        match self {
            Related::Many(set) => Some(set),
            Related::One(_) => None,
        }
    }

    pub fn to_json(&self, protect: bool, raw: bool) -> Json {
        match self {
            Related::One(Some(record)) => Json::Object(record.to_array(protect, raw)),
            Related::One(None) => Json::Null,
            Related::Many(set) => {
                Json::Array(set.to_array(protect, raw).into_iter().map(Json::Object).collect())
            }
        }
    }
}

/// What a name resolves to on a record.
#[derive(Debug)]
pub enum Attribute<'r> {
    Value(Value),
    One(Option<&'r Record>),
    Many(&'r ResultSet),
    Absent,
}

impl Attribute<'_> {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Attribute::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Attribute::Absent)
    }
}

#[derive(Clone)]
pub struct Record {
    model: ModelRef,
    columns: Columns,
    original: Columns,
    exists: bool,
    read_only: bool,
    includes: Includes,
    related: BTreeMap<String, Related>,
    hidden: BTreeSet<String>,
}

impl Record {
    /// A new, unsaved record of `model`.
    pub fn new(model: ModelRef) -> Self {
        let hidden = model.protected().iter().map(|c| (*c).to_owned()).collect();
        Self {
            model,
            columns: Columns::new(),
            original: Columns::new(),
            exists: false,
            read_only: false,
            includes: Includes::new(),
            related: BTreeMap::new(),
            hidden,
        }
    }

    pub fn of<M: Model + Default>() -> Self {
        Self::new(Arc::new(M::default()))
    }

    /// Build a persisted record from a fetched row, applying casts.
    pub fn hydrate(model: ModelRef, row: Row, read_only: bool, includes: Includes) -> Self {
        let mut record = Self::new(model);
        for (name, value) in row {
            let value = match record.model.cast(&name) {
                Some(cast) => cast.apply(value),
                None => value,
            };
            record.columns.insert(name, value);
        }
        record.original = record.columns.clone();
        record.exists = true;
        record.read_only = read_only;
        record.includes = includes;
        record
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    pub fn table(&self) -> &str {
        self.model.table_name()
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only || self.model.read_only()
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// Values as last read from or written to the database.
    pub fn original(&self) -> &Columns {
        &self.original
    }

    /// Current primary key value.
    pub fn key(&self) -> Option<&Value> {
        self.columns.get(self.model.primary_key())
    }

    /// Set a column. The model mutator runs unless `raw`; a declared cast
    /// always applies.
    pub fn set_column(&mut self, name: &str, value: impl Into<Value>, raw: bool) {
        let mut value = value.into();
        if !raw {
            value = self.model.mutator(name, value);
        }
        if let Some(cast) = self.model.cast(name) {
            value = cast.apply(value);
        }
        self.columns.insert(name.to_owned(), value);
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.set_column(name, value, false);
        self
    }

    /// Stored value, without the accessor.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.columns.get(name)
    }

    /// Resolve `name` against loaded relations, then columns (through the
    /// accessor), then computed columns. Never queries.
    pub fn attribute(&self, name: &str) -> Attribute<'_> {
        match self.related.get(name) {
            Some(Related::One(record)) => return Attribute::One(record.as_deref()),
            Some(Related::Many(set)) => return Attribute::Many(set),
            None => {}
        }
        match self.columns.get(name) {
            Some(value) => Attribute::Value(self.model.accessor(name, value.clone())),
            None if self.model.has_accessor(name) => {
                Attribute::Value(self.model.accessor(name, Value::String(None)))
            }
            None => Attribute::Absent,
        }
    }

    /// Resolve `name`, in order: an already loaded relation, a declared
    /// relation (loaded now and kept), the accessor unless `raw`, the stored
    /// value, nothing.
    pub fn get_column(&mut self, db: &Database, name: &str, raw: bool) -> OrmResult<Attribute<'_>> {
        if !self.related.contains_key(name) {
            if let Some(relation) = self.model.relation(name) {
                let loaded = relation.get_related(db, self)?;
                self.related.insert(name.to_owned(), loaded);
            }
        }
        if raw && !self.related.contains_key(name) {
            return Ok(match self.columns.get(name) {
                Some(value) => Attribute::Value(value.clone()),
                None => Attribute::Absent,
            });
        }
        Ok(self.attribute(name))
    }

    pub fn related(&self, name: &str) -> Option<&Related> {
        self.related.get(name)
    }

    /// Loaded relation `name`, querying for it on first access.
    pub fn load(&mut self, db: &Database, name: &str) -> OrmResult<&Related> {
        if !self.related.contains_key(name) {
            let relation = self.relation(name)?;
            let loaded = relation.get_related(db, self)?;
            self.related.insert(name.to_owned(), loaded);
        }
        self.related
            .get(name)
            .ok_or_else(|| OrmError::unknown_relation(self.model.type_name(), name))
    }

    pub fn set_related(&mut self, name: &str, related: Related) {
        self.related.insert(name.to_owned(), related);
    }

    /// Declared relation `name` of this record's model.
    pub fn relation(&self, name: &str) -> OrmResult<Relation> {
        self.model
            .relation(name)
            .ok_or_else(|| OrmError::unknown_relation(self.model.type_name(), name))
    }

    /// Mass-assign columns. The primary key of a persisted record is never
    /// reassigned; with `use_whitelist` columns outside
    /// [`Model::fillable`] are skipped.
    pub fn assign<I, K, V>(&mut self, values: I, raw: bool, use_whitelist: bool) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let model = self.model.clone();
        let fillable = if use_whitelist { model.fillable() } else { None };

        for (name, value) in values {
            let name = name.as_ref();
            if self.exists && name == model.primary_key() {
                continue;
            }
            if let Some(allowed) = fillable {
                if !allowed.contains(&name) {
                    log::trace!("{}: {name} is not fillable, skipped", self.table());
                    continue;
                }
            }
            self.set_column(name, value, raw);
        }
        self
    }

    /// [`assign`](Self::assign) through mutators and the allow-list.
    pub fn fill<I, K, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.assign(values, false, true)
    }

    /// [`fill`](Self::fill) from a JSON object; scalars become the matching
    /// SQL value, nested objects and arrays stay JSON.
    pub fn fill_json(&mut self, object: Map<String, Json>) -> &mut Self {
        self.fill(object.into_iter().map(|(name, json)| (name, from_json(json))))
    }

    /// Columns whose value differs (loosely) from the original.
    pub fn modified(&self) -> Columns {
        self.columns
            .iter()
            .filter(|(name, value)| {
                self.original
                    .get(*name)
                    .map_or(true, |original| !loose_eq(original, value))
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn is_modified(&self) -> bool {
        !self.modified().is_empty()
    }

    pub fn is_column_modified(&self, name: &str) -> bool {
        match (self.columns.get(name), self.original.get(name)) {
            (Some(current), Some(original)) => !loose_eq(current, original),
            (None, None) => false,
            _ => true,
        }
    }

    /// Insert a new record, or write the modified columns of a persisted
    /// one. Saving an unmodified persisted record issues nothing.
    ///
    /// # Errors
    ///
    /// [`OrmError::ReadOnlyRecord`] for read-only records or models,
    /// [`OrmError::StaleRecord`] when optimistic locking detects a
    /// concurrent write.
    pub fn save(&mut self, db: &Database) -> OrmResult<()> {
        if self.is_read_only() {
            return Err(OrmError::read_only(self.table()));
        }
        if self.exists {
            if !self.is_modified() {
                return Ok(());
            }
            locking::update(self, db)?;
        } else {
            self.perform_insert(db)?;
        }
        self.original = self.columns.clone();
        self.touch_owners(db)
    }

    fn perform_insert(&mut self, db: &Database) -> OrmResult<()> {
        let key = self.model.primary_key().to_owned();
        let missing = self.raw(&key).map_or(true, is_null);
        let mut want_id = false;

        match self.model.key_strategy() {
            KeyStrategy::Incrementing if missing => {
                self.columns.remove(&key);
                want_id = true;
            }
            KeyStrategy::Uuid if missing => {
                self.columns.insert(key.clone(), Value::from(Uuid::new_v4()));
            }
            KeyStrategy::Custom if missing => {
                let id = self.model.generate_primary_key()?;
                self.columns.insert(key.clone(), id);
            }
            _ => {}
        }

        if let Some(lock) = self.model.lock_column() {
            if self.raw(lock).map_or(true, is_null) {
                self.columns.insert(lock.to_owned(), Value::from(1i64));
            }
        }

        let (written, id) =
            RecordQuery::new(db, self.model.clone()).insert_row(self.columns.clone(), want_id)?;
        self.columns = written;
        if let Some(id) = id {
            self.columns.insert(key, id);
        }
        self.exists = true;
        log::debug!("inserted {} record", self.table());
        Ok(())
    }

    /// Delete the row. Deleting a record that was never saved is a no-op.
    pub fn delete(&mut self, db: &Database) -> OrmResult<u64> {
        if self.is_read_only() {
            return Err(OrmError::read_only(self.table()));
        }
        if !self.exists {
            return Ok(0);
        }
        let affected = locking::delete(self, db)?;
        self.exists = false;
        self.original.clear();
        self.related.clear();
        Ok(affected)
    }

    /// Re-read the row, dropping unsaved changes, and reload includes.
    pub fn reload(&mut self, db: &Database) -> OrmResult<()> {
        let key = self.persisted_key()?;
        let pk = self.model.primary_key().to_owned();
        let fresh = RecordQuery::new(db, self.model.clone())
            .clear_includes()
            .where_eq(&pk, key)
            .first()?
            .ok_or_else(|| OrmError::NotFound {
                table: self.table().to_owned(),
            })?;

        self.columns = fresh.columns;
        self.original = self.columns.clone();
        self.exists = true;
        self.related.clear();
        if !self.includes.is_empty() {
            let includes = self.includes.clone();
            let model = self.model.clone();
            eager::load(db, &model, std::slice::from_mut(self), &includes)?;
        }
        Ok(())
    }

    /// An unsaved copy without primary key, lock version or timestamps.
    pub fn replicate(&self) -> Record {
        let mut copy = Record::new(self.model.clone());
        copy.columns = self.columns.clone();
        copy.columns.remove(self.model.primary_key());
        if let Some(lock) = self.model.lock_column() {
            copy.columns.remove(lock);
        }
        copy.columns.remove(CREATED_AT);
        copy.columns.remove(UPDATED_AT);
        copy.includes = self.includes.clone();
        copy.hidden = self.hidden.clone();
        copy
    }

    /// Load relation paths onto this record and remember them for `reload`.
    pub fn include<I, T>(&mut self, db: &Database, paths: I) -> OrmResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Include>,
    {
        let includes: Includes = paths.into_iter().collect();
        let model = self.model.clone();
        eager::load(db, &model, std::slice::from_mut(self), &includes)?;
        for include in includes {
            self.includes.insert(include);
        }
        Ok(())
    }

    pub fn includes(&self) -> &Includes {
        &self.includes
    }

    /// Bump `updated_at` and save.
    pub fn touch(&mut self, db: &Database) -> OrmResult<()> {
        if !self.model.timestamps() {
            return Ok(());
        }
        self.columns
            .insert(UPDATED_AT.to_owned(), Value::from(Utc::now().naive_utc()));
        self.save(db)
    }

    fn touch_owners(&self, db: &Database) -> OrmResult<()> {
        for name in self.model.touches() {
            self.relation(name)?.touch(db, self)?;
        }
        Ok(())
    }

    /// Save `related` as part of relation `name` of this record.
    pub fn create_related(&self, db: &Database, name: &str, related: &mut Record) -> OrmResult<()> {
        self.relation(name)?.create(db, self, related)
    }

    pub fn link<I, V>(&self, db: &Database, name: &str, ids: I) -> OrmResult<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.relation(name)?.link(db, self, ids)
    }

    pub fn unlink<I, V>(&self, db: &Database, name: &str, ids: I) -> OrmResult<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.relation(name)?.unlink(db, self, ids)
    }

    pub fn synchronize<I, V>(&self, db: &Database, name: &str, ids: I) -> OrmResult<SyncChanges>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.relation(name)?.synchronize(db, self, ids)
    }

    /// Hide columns from projections.
    pub fn protect<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Show columns the model or an earlier `protect` hid.
    pub fn expose<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            self.hidden.remove(&column.into());
        }
        self
    }

    /// Columns (through accessors unless `raw`) and loaded relations,
    /// without protected columns when `protect`.
    pub fn to_array(&self, protect: bool, raw: bool) -> Map<String, Json> {
        let mut map = Map::new();
        for (name, value) in &self.columns {
            if protect && self.hidden.contains(name) {
                continue;
            }
            let value = if raw {
                to_json(value)
            } else {
                to_json(&self.model.accessor(name, value.clone()))
            };
            map.insert(name.clone(), value);
        }
        for (name, related) in &self.related {
            if protect && self.hidden.contains(name) {
                continue;
            }
            map.insert(name.clone(), related.to_json(protect, raw));
        }
        map
    }

    pub fn to_json(&self, protect: bool, raw: bool) -> Json {
        Json::Object(self.to_array(protect, raw))
    }

    pub(crate) fn persisted_key(&self) -> OrmResult<Value> {
        let pk = self.model.primary_key();
        self.original
            .get(pk)
            .filter(|value| !is_null(value))
            .or_else(|| self.columns.get(pk).filter(|value| !is_null(value)))
            .cloned()
            .ok_or_else(|| OrmError::MissingPrimaryKey {
                table: self.table().to_owned(),
                key: pk.to_owned(),
            })
    }

    /// Copy carrying state but no loaded relations.
    pub(crate) fn detached(&self) -> Record {
        Record {
            model: self.model.clone(),
            columns: self.columns.clone(),
            original: self.original.clone(),
            exists: self.exists,
            read_only: self.read_only,
            includes: Includes::new(),
            related: BTreeMap::new(),
            hidden: self.hidden.clone(),
        }
    }

    pub(crate) fn take_related(&mut self, name: &str) -> Option<Related> {
        self.related.remove(name)
    }

    pub(crate) fn forget_column(&mut self, name: &str) {
        self.columns.remove(name);
        self.original.remove(name);
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("table", &self.table())
            .field("exists", &self.exists)
            .field("read_only", &self.read_only)
            .field("columns", &self.columns)
            .field("related", &self.related.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array(true, false).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use crate::value::Cast;

    #[derive(Default)]
    struct User;

    impl Model for User {
        fn table_name(&self) -> &str {
            "users"
        }

        fn fillable(&self) -> Option<&[&str]> {
            Some(&["name", "email"])
        }

        fn protected(&self) -> &[&str] {
            &["password"]
        }

        fn mutator(&self, column: &str, value: Value) -> Value {
            match (column, value) {
                ("email", Value::String(Some(email))) => Value::from(email.to_lowercase()),
                (_, value) => value,
            }
        }

        fn cast(&self, column: &str) -> Option<Cast> {
            (column == "admin").then_some(Cast::Bool)
        }
    }

    fn persisted() -> Record {
        Record::hydrate(
            Arc::new(User),
            row! { "id" => 7, "name" => "Ada", "password" => "secret", "admin" => 1 },
            false,
            Includes::new(),
        )
    }

    #[test]
    fn test_hydrate_casts_and_tracks_original() {
        let record = persisted();
        assert!(record.exists());
        assert_eq!(record.raw("admin"), Some(&Value::from(true)));
        assert!(!record.is_modified());
    }

    #[test]
    fn test_fill_respects_whitelist_and_key() {
        let mut record = persisted();
        record.fill([
            ("id", Value::from(99)),
            ("name", Value::from("Grace")),
            ("admin", Value::from(true)),
            ("email", Value::from("ADA@Example.com")),
        ]);

        assert_eq!(record.raw("id"), Some(&Value::from(7)));
        assert_eq!(record.raw("name"), Some(&Value::from("Grace")));
        assert_eq!(record.raw("email"), Some(&Value::from("ada@example.com")));
        let modified = record.modified();
        assert_eq!(
            modified.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["email", "name"]
        );
    }

    #[test]
    fn test_loose_diff_ignores_representation() {
        let mut record = persisted();
        record.set_column("id", "7", true);
        record.set_column("name", "Ada", true);
        assert!(!record.is_modified());

        record.set_column("name", Value::String(None), true);
        assert!(record.is_column_modified("name"));
    }

    #[test]
    fn test_projection_hides_protected() {
        let mut record = persisted();
        let map = record.to_array(true, false);
        assert!(!map.contains_key("password"));
        assert_eq!(map.get("name"), Some(&Json::from("Ada")));

        record.expose(["password"]).protect(["admin"]);
        let map = record.to_array(true, false);
        assert!(map.contains_key("password"));
        assert!(!map.contains_key("admin"));
        assert_eq!(record.to_array(false, true).len(), 4);
    }

    #[test]
    fn test_replicate_is_new() {
        let record = persisted();
        let copy = record.replicate();
        assert!(!copy.exists());
        assert!(copy.raw("id").is_none());
        assert_eq!(copy.raw("name"), record.raw("name"));
        assert!(copy.is_modified());
    }

    #[test]
    fn test_copies_do_not_share_state() {
        let mut record = persisted();
        record.set_related("friend", Related::One(Some(Box::new(persisted()))));

        let mut copy = record.replicate();
        copy.set("name", "Grace").protect(["name"]);
        assert_eq!(record.raw("name"), Some(&Value::from("Ada")));
        assert!(record.to_array(true, false).contains_key("name"));

        let mut clone = record.clone();
        clone.set("name", "Grace");
        if let Some(Related::One(Some(friend))) = clone.related.get_mut("friend") {
            friend.set("name", "Linus");
        }
        assert!(!record.is_modified());
        let friend = record.related("friend").and_then(Related::as_one).expect("friend");
        assert_eq!(friend.raw("name"), Some(&Value::from("Ada")));
    }
}
