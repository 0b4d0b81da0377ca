//! Loose value comparison.
//!
//! Drivers do not agree on how a column comes back: MySQL hands numbers over
//! as strings, SQLite widens every integer, a key bound as `Int` is read back
//! as `BigInt`. Dirty tracking and relation grouping both compare through
//! [`KeyValue`], a normalized form where those representations collapse.

use sea_query::Value;

/// Normalized, hashable form of a [`Value`].
///
/// * every null is [`KeyValue::Null`], whatever the variant
/// * integers of any width, integral floats, booleans and numeric strings
///   become [`KeyValue::Int`]
/// * other finite numbers become [`KeyValue::Float`] (bit pattern)
/// * uuids, chars, dates and json strings become [`KeyValue::Text`]
///
/// Null never equals `""` or `0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Null,
    Int(i128),
    Float(u64),
    Text(String),
    Bytes(Vec<u8>),
    Other(String),
}

impl From<&Value> for KeyValue {
    fn from(value: &Value) -> Self {
        normalize(value)
    }
}

/// Loose equality: `true` when both values normalize to the same key.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    normalize(a) == normalize(b)
}

pub fn normalize(value: &Value) -> KeyValue {
    #[allow(unreachable_patterns)]
    match value {
        Value::Bool(Some(v)) => KeyValue::Int(i128::from(*v)),
        Value::TinyInt(Some(v)) => KeyValue::Int(i128::from(*v)),
        Value::SmallInt(Some(v)) => KeyValue::Int(i128::from(*v)),
        Value::Int(Some(v)) => KeyValue::Int(i128::from(*v)),
        Value::BigInt(Some(v)) => KeyValue::Int(i128::from(*v)),
        Value::TinyUnsigned(Some(v)) => KeyValue::Int(i128::from(*v)),
        Value::SmallUnsigned(Some(v)) => KeyValue::Int(i128::from(*v)),
        Value::Unsigned(Some(v)) => KeyValue::Int(i128::from(*v)),
        Value::BigUnsigned(Some(v)) => KeyValue::Int(i128::from(*v)),
        Value::Float(Some(v)) => float_key(f64::from(*v)),
        Value::Double(Some(v)) => float_key(*v),
        Value::String(Some(v)) => text_key(v),
        Value::Char(Some(v)) => KeyValue::Text(v.to_string()),
        Value::Bytes(Some(v)) => KeyValue::Bytes(v.to_vec()),
        Value::Json(Some(v)) => match &**v {
            serde_json::Value::Null => KeyValue::Null,
            serde_json::Value::Bool(b) => KeyValue::Int(i128::from(*b)),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
                (Some(i), _, _) => KeyValue::Int(i128::from(i)),
                (_, Some(u), _) => KeyValue::Int(i128::from(u)),
                (_, _, Some(f)) => float_key(f),
                _ => KeyValue::Other(n.to_string()),
            },
            serde_json::Value::String(s) => text_key(s),
            other => KeyValue::Other(other.to_string()),
        },
        Value::ChronoDate(Some(v)) => KeyValue::Text(v.to_string()),
        Value::ChronoTime(Some(v)) => KeyValue::Text(v.to_string()),
        Value::ChronoDateTime(Some(v)) => KeyValue::Text(v.to_string()),
        Value::ChronoDateTimeUtc(Some(v)) => KeyValue::Text(v.naive_utc().to_string()),
        Value::ChronoDateTimeLocal(Some(v)) => KeyValue::Text(v.naive_utc().to_string()),
        Value::ChronoDateTimeWithTimeZone(Some(v)) => KeyValue::Text(v.naive_utc().to_string()),
        Value::Uuid(Some(v)) => KeyValue::Text(v.hyphenated().to_string()),
        other if is_null(other) => KeyValue::Null,
        other => KeyValue::Other(format!("{other:?}")),
    }
}

/// Whether the value is SQL `NULL`, regardless of its variant.
pub fn is_null(value: &Value) -> bool {
    #[allow(unreachable_patterns)]
    match value {
        Value::Bool(v) => v.is_none(),
        Value::TinyInt(v) => v.is_none(),
        Value::SmallInt(v) => v.is_none(),
        Value::Int(v) => v.is_none(),
        Value::BigInt(v) => v.is_none(),
        Value::TinyUnsigned(v) => v.is_none(),
        Value::SmallUnsigned(v) => v.is_none(),
        Value::Unsigned(v) => v.is_none(),
        Value::BigUnsigned(v) => v.is_none(),
        Value::Float(v) => v.is_none(),
        Value::Double(v) => v.is_none(),
        Value::String(v) => v.is_none(),
        Value::Char(v) => v.is_none(),
        Value::Bytes(v) => v.is_none(),
        Value::Json(v) => v.is_none(),
        Value::ChronoDate(v) => v.is_none(),
        Value::ChronoTime(v) => v.is_none(),
        Value::ChronoDateTime(v) => v.is_none(),
        Value::ChronoDateTimeUtc(v) => v.is_none(),
        Value::ChronoDateTimeLocal(v) => v.is_none(),
        Value::ChronoDateTimeWithTimeZone(v) => v.is_none(),
        Value::Uuid(v) => v.is_none(),
        _ => false,
    }
}

/// Integer view of a value, used for counts and lock versions.
pub fn as_i64(value: &Value) -> Option<i64> {
    match normalize(value) {
        KeyValue::Int(v) => i64::try_from(v).ok(),
        _ => None,
    }
}

fn float_key(v: f64) -> KeyValue {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e38 {
        KeyValue::Int(v as i128)
    } else if v.is_nan() {
        KeyValue::Other("NaN".to_owned())
    } else {
        KeyValue::Float(v.to_bits())
    }
}

fn text_key(s: &str) -> KeyValue {
    if let Ok(i) = s.parse::<i128>() {
        return KeyValue::Int(i);
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() && !s.is_empty() => float_key(f),
        _ => KeyValue::Text(s.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widths_compare_equal() {
        assert!(loose_eq(&Value::Int(Some(5)), &Value::BigInt(Some(5))));
        assert!(loose_eq(&Value::TinyUnsigned(Some(5)), &Value::SmallInt(Some(5))));
        assert!(!loose_eq(&Value::Int(Some(5)), &Value::Int(Some(6))));
    }

    #[test]
    fn test_numeric_strings_compare_to_numbers() {
        assert!(loose_eq(&Value::from("42"), &Value::Int(Some(42))));
        assert!(loose_eq(&Value::from("1.5"), &Value::Double(Some(1.5))));
        assert!(loose_eq(&Value::Double(Some(3.0)), &Value::BigInt(Some(3))));
        assert!(!loose_eq(&Value::from("42a"), &Value::Int(Some(42))));
    }

    #[test]
    fn test_bool_compares_to_zero_and_one() {
        assert!(loose_eq(&Value::Bool(Some(true)), &Value::Int(Some(1))));
        assert!(loose_eq(&Value::Bool(Some(false)), &Value::from("0")));
    }

    #[test]
    fn test_nulls() {
        assert!(loose_eq(&Value::Int(None), &Value::String(None)));
        assert!(!loose_eq(&Value::String(None), &Value::from("")));
        assert!(!loose_eq(&Value::Int(None), &Value::Int(Some(0))));
        assert!(is_null(&Value::Json(None)));
        assert!(!is_null(&Value::from("")));
    }

    #[test]
    fn test_uuid_matches_its_text() {
        let id = uuid::Uuid::new_v4();
        assert!(loose_eq(&Value::from(id), &Value::from(id.to_string())));
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(as_i64(&Value::from("17")), Some(17));
        assert_eq!(as_i64(&Value::BigUnsigned(Some(3))), Some(3));
        assert_eq!(as_i64(&Value::from("x")), None);
        assert_eq!(as_i64(&Value::Int(None)), None);
    }
}
