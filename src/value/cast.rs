//! Declared column casts.
//!
//! A model can pin a column to one representation; the cast runs on
//! hydration and on every non-raw assignment. Values that cannot be
//! converted are kept as they are.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use sea_query::Value;

use super::compare::{is_null, normalize, KeyValue};
use super::json::{special_float, to_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    Integer,
    Float,
    Bool,
    String,
    Json,
    Date,
    DateTime,
}

impl Cast {
    pub fn apply(self, value: Value) -> Value {
        if is_null(&value) {
            return self.null();
        }
        let converted = match self {
            Cast::Integer => to_integer(&value),
            Cast::Float => to_float(&value),
            Cast::Bool => to_bool(&value),
            Cast::String => Some(to_text(&value)),
            Cast::Json => Some(to_json_value(&value)),
            Cast::Date => to_date(&value),
            Cast::DateTime => to_datetime(&value),
        };
        match converted {
            Some(v) => v,
            None => {
                log::debug!("cast {self:?} left value {value:?} unconverted");
                value
            }
        }
    }

    fn null(self) -> Value {
        match self {
            Cast::Integer => Value::BigInt(None),
            Cast::Float => Value::Double(None),
            Cast::Bool => Value::Bool(None),
            Cast::String => Value::String(None),
            Cast::Json => Value::Json(None),
            Cast::Date => Value::ChronoDate(None),
            Cast::DateTime => Value::ChronoDateTime(None),
        }
    }
}

fn to_integer(value: &Value) -> Option<Value> {
    match normalize(value) {
        KeyValue::Int(i) => i64::try_from(i).ok().map(|i| Value::BigInt(Some(i))),
        KeyValue::Float(bits) => Some(Value::BigInt(Some(f64::from_bits(bits).trunc() as i64))),
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<Value> {
    match value {
        Value::Float(Some(f)) => return Some(Value::Double(Some(f64::from(*f)))),
        Value::Double(Some(f)) => return Some(Value::Double(Some(*f))),
        Value::String(Some(s)) => {
            if let Some(f) = special_float(s) {
                return Some(Value::Double(Some(f)));
            }
        }
        _ => {}
    }
    match normalize(value) {
        KeyValue::Int(i) => Some(Value::Double(Some(i as f64))),
        KeyValue::Float(bits) => Some(Value::Double(Some(f64::from_bits(bits)))),
        _ => None,
    }
}

fn to_bool(value: &Value) -> Option<Value> {
    if let Value::String(Some(s)) = value {
        let b = match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" => Some(true),
            "false" | "f" | "no" | "n" | "off" | "" => Some(false),
            _ => None,
        };
        if b.is_some() {
            return Some(Value::Bool(b));
        }
    }
    match normalize(value) {
        KeyValue::Int(i) => Some(Value::Bool(Some(i != 0))),
        KeyValue::Float(bits) => Some(Value::Bool(Some(f64::from_bits(bits) != 0.0))),
        _ => None,
    }
}

fn to_text(value: &Value) -> Value {
    let text = match to_json(value) {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };
    Value::String(Some(Box::new(text)))
}

fn to_json_value(value: &Value) -> Value {
    let json = match value {
        Value::Json(_) => return value.clone(),
        Value::String(Some(s)) => serde_json::from_str(s).unwrap_or_else(|_| to_json(value)),
        other => to_json(other),
    };
    Value::Json(Some(Box::new(json)))
}

fn to_date(value: &Value) -> Option<Value> {
    match value {
        Value::ChronoDate(Some(d)) => Some(Value::ChronoDate(Some(d.clone()))),
        Value::String(Some(s)) => parse_date(s).map(Value::from),
        other => to_datetime(other).and_then(|v| match v {
            Value::ChronoDateTime(Some(dt)) => Some(Value::from(dt.date())),
            _ => None,
        }),
    }
}

fn to_datetime(value: &Value) -> Option<Value> {
    let dt = match value {
        Value::ChronoDateTime(Some(dt)) => **dt,
        Value::ChronoDateTimeUtc(Some(dt)) => dt.naive_utc(),
        Value::ChronoDateTimeLocal(Some(dt)) => dt.naive_utc(),
        Value::ChronoDateTimeWithTimeZone(Some(dt)) => dt.naive_utc(),
        Value::ChronoDate(Some(d)) => d.and_hms_opt(0, 0, 0)?,
        Value::String(Some(s)) => parse_datetime(s)?,
        _ => return None,
    };
    Some(Value::from(dt))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date()))
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
