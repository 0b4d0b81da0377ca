//! Column stamping applied before every insert and update.

use chrono::Utc;
use sea_query::Value;

use crate::model::{Model, CREATED_AT, UPDATED_AT};
use crate::record::Columns;
use crate::value::is_null;

/// Fill `created_at`/`updated_at` when unset, then store empty strings of
/// nullable columns as `NULL`.
pub(crate) fn stamp_insert(model: &dyn Model, columns: &mut Columns) {
    if model.timestamps() {
        let now = Value::from(Utc::now().naive_utc());
        for column in [CREATED_AT, UPDATED_AT] {
            let entry = columns
                .entry(column.to_owned())
                .or_insert(Value::ChronoDateTime(None));
            if is_null(entry) {
                *entry = now.clone();
            }
        }
    }
    nullify(model, columns);
}

/// Bump `updated_at` unless the caller set it, then null out empty strings.
pub(crate) fn stamp_update(model: &dyn Model, columns: &mut Columns) {
    if model.timestamps() && !columns.contains_key(UPDATED_AT) {
        columns.insert(UPDATED_AT.to_owned(), Value::from(Utc::now().naive_utc()));
    }
    nullify(model, columns);
}

fn nullify(model: &dyn Model, columns: &mut Columns) {
    for column in model.nullable() {
        if let Some(value) = columns.get_mut(*column) {
            if matches!(value, Value::String(Some(s)) if s.is_empty()) {
                *value = Value::String(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Post;

    impl Model for Post {
        fn table_name(&self) -> &str {
            "posts"
        }

        fn timestamps(&self) -> bool {
            true
        }

        fn nullable(&self) -> &[&str] {
            &["subtitle"]
        }
    }

    #[test]
    fn test_insert_stamps_both_columns() {
        let mut columns = Columns::new();
        columns.insert("subtitle".into(), "".into());
        columns.insert("title".into(), "".into());
        stamp_insert(&Post, &mut columns);

        assert!(matches!(columns.get(CREATED_AT), Some(Value::ChronoDateTime(Some(_)))));
        assert!(matches!(columns.get(UPDATED_AT), Some(Value::ChronoDateTime(Some(_)))));
        assert_eq!(columns.get("subtitle"), Some(&Value::String(None)));
        assert_eq!(columns.get("title"), Some(&Value::from("")));
    }

    #[test]
    fn test_update_keeps_explicit_timestamp() {
        let explicit = Value::from("2020-01-01 00:00:00");
        let mut columns = Columns::new();
        columns.insert(UPDATED_AT.into(), explicit.clone());
        stamp_update(&Post, &mut columns);

        assert_eq!(columns.get(UPDATED_AT), Some(&explicit));
        assert!(!columns.contains_key(CREATED_AT));
    }
}
