use std::collections::BTreeMap;

use crate::decimal::Decimal;
use crate::error::{Result, StoreError};

/// Non-key attributes of a record, ordered by name.
pub type Attributes = BTreeMap<String, Value>;

/// An attribute value as stored in the table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    S(String),
    N(Decimal),
    Bool(bool),
    Null,
    L(Vec<Value>),
    M(Attributes),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::N(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Attributes> {
        match self {
            Value::M(map) => Some(map),
            _ => None,
        }
    }

    /// Name of the DynamoDB type this value is stored as.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::S(_) => "S",
            Value::N(_) => "N",
            Value::Bool(_) => "BOOL",
            Value::Null => "NULL",
            Value::L(_) => "L",
            Value::M(_) => "M",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::S(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::S(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::N(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::N(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::N(value.into())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::L(items.into_iter().map(Into::into).collect())
    }
}

impl From<Attributes> for Value {
    fn from(map: Attributes) -> Self {
        Value::M(map)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = StoreError;

    /// JSON numbers become decimals from their literal text, with no rounding.
    fn try_from(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(s) => Ok(Value::S(s)),
            serde_json::Value::Number(num) => Ok(Value::N(num.to_string().parse()?)),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Array(arr) => Ok(Value::L(
                arr.into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_>>()?,
            )),
            serde_json::Value::Object(map) => {
                let mut attributes = Attributes::new();
                for (k, v) in map {
                    attributes.insert(k, Value::try_from(v)?);
                }
                Ok(Value::M(attributes))
            }
        }
    }
}

/// Composite primary key: numeric partition key plus string sort key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub year: i64,
    pub title: String,
}

impl RecordKey {
    pub fn new(year: i64, title: impl Into<String>) -> Self {
        Self {
            year,
            title: title.into(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {:?})", self.year, self.title)
    }
}

/// A movie record: its key plus the open attribute bag.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: RecordKey,
    pub attributes: Attributes,
}

impl Record {
    pub fn new(key: RecordKey, attributes: Attributes) -> Self {
        Self { key, attributes }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_conversion_keeps_decimals_exact() {
        let value = Value::try_from(json!({
            "rating": 6.2,
            "rank": 11,
            "genres": ["Comedy", "Drama"],
            "release_date": null,
        }))
        .unwrap();

        let map = value.as_map().unwrap();
        assert_eq!(map["rating"], Value::N("6.2".parse().unwrap()));
        assert_eq!(map["rank"], Value::from(11));
        assert_eq!(map["genres"], Value::from(vec!["Comedy", "Drama"]));
        assert_eq!(map["release_date"], Value::Null);
    }

    #[test]
    fn test_key_ordering_is_by_year_then_title() {
        let mut keys = vec![
            RecordKey::new(2013, "Rush"),
            RecordKey::new(1985, "Witness"),
            RecordKey::new(2013, "Prisoners"),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                RecordKey::new(1985, "Witness"),
                RecordKey::new(2013, "Prisoners"),
                RecordKey::new(2013, "Rush"),
            ]
        );
    }
}
