//! Conversion of stored values into plain JSON for display.
//!
//! Decimals with no fractional remainder print as JSON integers, everything
//! else as JSON floats. Nothing here can fail.

use serde_json::{Map, Number};

use crate::decimal::Decimal;
use crate::model::{Attributes, Record, Value};

/// Integer when `value` has no fractional part and fits 64 bits, float otherwise.
pub fn normalize_number(value: Decimal) -> Number {
    if value.is_integer() {
        if let Some(i) = value.to_i64() {
            return i.into();
        }
        if let Some(u) = value.to_u64() {
            return u.into();
        }
    }
    // Decimals stay within 1E-130 ..< 1E+126, so the float is always finite.
    Number::from_f64(value.to_f64()).unwrap_or_else(|| 0.into())
}

pub fn normalize_value(value: &Value) -> serde_json::Value {
    match value {
        Value::S(s) => serde_json::Value::String(s.clone()),
        Value::N(n) => serde_json::Value::Number(normalize_number(*n)),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Null => serde_json::Value::Null,
        Value::L(items) => serde_json::Value::Array(items.iter().map(normalize_value).collect()),
        Value::M(map) => serde_json::Value::Object(normalize_attributes(map)),
    }
}

pub fn normalize_attributes(attributes: &Attributes) -> Map<String, serde_json::Value> {
    attributes
        .iter()
        .map(|(k, v)| (k.clone(), normalize_value(v)))
        .collect()
}

/// The whole record, key attributes included, as a JSON object.
pub fn normalize_record(record: &Record) -> serde_json::Value {
    let mut map = normalize_attributes(&record.attributes);
    map.insert("year".to_string(), record.key.year.into());
    map.insert("title".to_string(), record.key.title.clone().into());
    serde_json::Value::Object(map)
}

/// Pretty-printed JSON text of a normalized value.
pub fn to_pretty_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
