//! Optimistic locking around record updates and deletes.
//!
//! Models with a lock column carry an integer version. Writes are
//! conditioned on the version the record was loaded with; an update bumps
//! it. Zero affected rows means another writer got there first.

use sea_query::Value;
use serde_json::Value as Json;

use super::{Columns, Record};
use crate::connection::Database;
use crate::error::{OrmError, OrmResult};
use crate::query::RecordQuery;
use crate::value::{as_i64, to_json};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// Write the modified columns of `record`.
pub(super) fn update(record: &mut Record, db: &Database) -> OrmResult<()> {
    let model = record.model.clone();
    let key = record.persisted_key()?;
    let mut changes = record.modified();
    let mut query = RecordQuery::new(db, model.clone())
        .clear_includes()
        .where_eq(model.primary_key(), key.clone());

    let Some(lock) = model.lock_column() else {
        let (_, written) = query.update_rows(changes)?;
        merge(record, written);
        return Ok(());
    };

    let loaded = record
        .original
        .get(lock)
        .cloned()
        .unwrap_or(Value::BigInt(None));
    let next = Value::from(as_i64(&loaded).unwrap_or(0) + 1);
    let previous = record.columns.insert(lock.to_owned(), next.clone());
    changes.insert(lock.to_owned(), next);
    query = query.where_eq(lock, loaded);

    let restore = |record: &mut Record| match previous.clone() {
        Some(value) => {
            record.columns.insert(lock.to_owned(), value);
        }
        None => {
            record.columns.remove(lock);
        }
    };

    match query.update_rows(changes) {
        Ok((0, _)) => {
            restore(record);
            Err(stale(record, &key))
        }
        Ok((_, written)) => {
            merge(record, written);
            Ok(())
        }
        Err(err) => {
            restore(record);
            Err(err)
        }
    }
}

/// Delete the row of `record`, conditioned on its lock version.
pub(super) fn delete(record: &Record, db: &Database) -> OrmResult<u64> {
    let model = record.model.clone();
    let key = record.persisted_key()?;
    let mut query = RecordQuery::new(db, model.clone())
        .clear_includes()
        .where_eq(model.primary_key(), key.clone());
    if let Some(lock) = model.lock_column() {
        let loaded = record
            .original
            .get(lock)
            .cloned()
            .unwrap_or(Value::BigInt(None));
        query = query.where_eq(lock, loaded);
    }

    let affected = query.delete()?;
    if affected == 0 && model.lock_column().is_some() {
        return Err(stale(record, &key));
    }
    Ok(affected)
}

fn merge(record: &mut Record, written: Columns) {
    record.columns.extend(written);
}

fn stale(record: &Record, key: &Value) -> OrmError {
    let key = match to_json(key) {
        Json::String(s) => s,
        other => other.to_string(),
    };
    log::warn!("stale write rejected for {} row {key}", record.table());
    #[cfg(feature = "metrics")]
    METRICS.record_stale();
    OrmError::stale(record.table(), key)
}
