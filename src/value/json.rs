//! JSON projection of column values.
//!
//! Non-finite floats have no JSON number form; they are written as the
//! strings `"NaN"`, `"Infinity"` and `"-Infinity"` and read back by
//! [`special_float`] when a float cast is applied.

use sea_query::Value;
use serde_json::{Number, Value as Json};

use super::compare::is_null;

/// Convert a column value into its JSON projection.
pub fn to_json(value: &Value) -> Json {
    if is_null(value) {
        return Json::Null;
    }
    #[allow(unreachable_patterns)]
    match value {
        Value::Bool(Some(v)) => Json::Bool(*v),
        Value::TinyInt(Some(v)) => Json::from(*v),
        Value::SmallInt(Some(v)) => Json::from(*v),
        Value::Int(Some(v)) => Json::from(*v),
        Value::BigInt(Some(v)) => Json::from(*v),
        Value::TinyUnsigned(Some(v)) => Json::from(*v),
        Value::SmallUnsigned(Some(v)) => Json::from(*v),
        Value::Unsigned(Some(v)) => Json::from(*v),
        Value::BigUnsigned(Some(v)) => Json::from(*v),
        Value::Float(Some(v)) => float_to_json(f64::from(*v)),
        Value::Double(Some(v)) => float_to_json(*v),
        Value::String(Some(v)) => Json::String(v.as_str().to_owned()),
        Value::Char(Some(v)) => Json::String(v.to_string()),
        Value::Bytes(Some(v)) => Json::String(String::from_utf8_lossy(v).into_owned()),
        Value::Json(Some(v)) => (**v).clone(),
        Value::ChronoDate(Some(v)) => Json::String(v.format("%Y-%m-%d").to_string()),
        Value::ChronoTime(Some(v)) => Json::String(v.format("%H:%M:%S%.f").to_string()),
        Value::ChronoDateTime(Some(v)) => {
            Json::String(v.format("%Y-%m-%d %H:%M:%S%.f").to_string())
        }
        Value::ChronoDateTimeUtc(Some(v)) => Json::String(v.to_rfc3339()),
        Value::ChronoDateTimeLocal(Some(v)) => Json::String(v.to_rfc3339()),
        Value::ChronoDateTimeWithTimeZone(Some(v)) => Json::String(v.to_rfc3339()),
        Value::Uuid(Some(v)) => Json::String(v.hyphenated().to_string()),
        other => Json::String(other.to_string()),
    }
}

/// Convert a JSON value into a column value.
///
/// Objects and arrays stay JSON; scalars map to the matching SQL type.
pub fn from_json(json: Json) -> Value {
    match json {
        Json::Null => Value::String(None),
        Json::Bool(b) => Value::Bool(Some(b)),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::BigInt(Some(i))
            } else if let Some(u) = n.as_u64() {
                Value::BigUnsigned(Some(u))
            } else {
                Value::Double(n.as_f64())
            }
        }
        Json::String(s) => Value::String(Some(Box::new(s))),
        other => Value::Json(Some(Box::new(other))),
    }
}

/// Parse the string forms of non-finite floats.
pub fn special_float(s: &str) -> Option<f64> {
    match s {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

fn float_to_json(v: f64) -> Json {
    match Number::from_f64(v) {
        Some(n) => Json::Number(n),
        None if v.is_nan() => Json::String("NaN".to_owned()),
        None if v.is_sign_positive() => Json::String("Infinity".to_owned()),
        None => Json::String("-Infinity".to_owned()),
    }
}
