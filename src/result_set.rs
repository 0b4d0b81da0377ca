//! Ordered collections of records.

use std::fmt;
use std::ops::{Index, IndexMut};

use sea_query::Value;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as Json};

use crate::connection::Database;
use crate::error::OrmResult;
use crate::model::ModelRef;
use crate::query::{Include, Includes};
use crate::record::Record;
use crate::relation::eager;

/// Records returned by a query or loaded for a to-many relation.
#[derive(Clone, Default)]
pub struct ResultSet {
    records: Vec<Record>,
    model: Option<ModelRef>,
}

impl ResultSet {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            model: None,
        }
    }

    /// Remember the model so an empty set can still load includes.
    pub fn with_model(mut self, model: ModelRef) -> Self {
        self.model = Some(model);
        self
    }

    pub fn model(&self) -> Option<&ModelRef> {
        self.model.as_ref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Record> {
        self.records.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn into_vec(self) -> Vec<Record> {
        self.records
    }

    /// Raw value of `column` for every record (null where absent).
    pub fn pluck(&self, column: &str) -> Vec<Value> {
        self.records
            .iter()
            .map(|record| record.raw(column).cloned().unwrap_or(Value::String(None)))
            .collect()
    }

    pub fn to_array(&self, protect: bool, raw: bool) -> Vec<Map<String, Json>> {
        self.records
            .iter()
            .map(|record| record.to_array(protect, raw))
            .collect()
    }

    pub fn to_json(&self, protect: bool, raw: bool) -> Json {
        Json::Array(self.to_array(protect, raw).into_iter().map(Json::Object).collect())
    }

    /// Load relation paths onto every record with one query per relation.
    pub fn include<I, T>(&mut self, db: &Database, paths: I) -> OrmResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Include>,
    {
        let Some(model) = self
            .model
            .clone()
            .or_else(|| self.records.first().map(|record| record.model().clone()))
        else {
            return Ok(());
        };
        let includes: Includes = paths.into_iter().collect();
        eager::load(db, &model, &mut self.records, &includes)
    }

    pub fn protect<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        for record in &mut self.records {
            record.protect(columns.iter().cloned());
        }
        self
    }

    pub fn expose<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        for record in &mut self.records {
            record.expose(columns.iter().cloned());
        }
        self
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.records).finish()
    }
}

impl Index<usize> for ResultSet {
    type Output = Record;

    fn index(&self, index: usize) -> &Record {
        &self.records[index]
    }
}

impl IndexMut<usize> for ResultSet {
    fn index_mut(&mut self, index: usize) -> &mut Record {
        &mut self.records[index]
    }
}

impl IntoIterator for ResultSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'s> IntoIterator for &'s ResultSet {
    type Item = &'s Record;
    type IntoIter = std::slice::Iter<'s, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl<'s> IntoIterator for &'s mut ResultSet {
    type Item = &'s mut Record;
    type IntoIter = std::slice::IterMut<'s, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter_mut()
    }
}

impl FromIterator<Record> for ResultSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array(true, false).serialize(serializer)
    }
}
