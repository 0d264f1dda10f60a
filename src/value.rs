//! Canonical value representation shared by statements, documents, and the
//! transport boundary.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::rid::RecordId;

/// Typed value tagged with explicit type information so the wire format remains
/// unambiguous when documents are serialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    /// Null literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed 64-bit integer literal.
    Int(i64),
    /// 64-bit floating point literal.
    Float(f64),
    /// UTF-8 string literal.
    String(String),
    /// Date and time without offset, rendered as `YYYY-MM-DD HH:MM:SS`.
    #[serde(with = "serde_datetime")]
    DateTime(PrimitiveDateTime),
    /// Link to another record.
    Link(RecordId),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Embedded document or map, ordered by key.
    Map(BTreeMap<String, Value>),
}

mod serde_datetime {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;
    use time::PrimitiveDateTime;

    pub fn serialize<S: Serializer>(value: &PrimitiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_datetime(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<PrimitiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DateTimeVisitor;

        impl<'de> Visitor<'de> for DateTimeVisitor {
            type Value = PrimitiveDateTime;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a `YYYY-MM-DD HH:MM:SS` string or unix seconds")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                super::datetime_from_unix(value)
                    .ok_or_else(|| E::custom(format!("timestamp {value} out of range")))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                let secs = i64::try_from(value)
                    .map_err(|_| E::custom(format!("timestamp {value} out of range")))?;
                self.visit_i64(secs)
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                super::parse_datetime(value)
                    .ok_or_else(|| E::custom(format!("invalid datetime literal '{value}'")))
            }
        }

        deserializer.deserialize_any(DateTimeVisitor)
    }
}

/// Formats a datetime the way the database expects it in literals.
pub fn format_datetime(value: &PrimitiveDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    value
        .format(&format)
        .unwrap_or_else(|_| value.to_string())
}

/// Parses `YYYY-MM-DD HH:MM:SS`, or a bare `YYYY-MM-DD` at midnight.
pub fn parse_datetime(text: &str) -> Option<PrimitiveDateTime> {
    let full = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    if let Ok(value) = PrimitiveDateTime::parse(text, &full) {
        return Some(value);
    }
    let date_only = format_description!("[year]-[month]-[day]");
    time::Date::parse(text, &date_only)
        .ok()
        .map(|date| date.midnight())
}

/// Converts unix seconds (UTC) to a datetime.
pub fn datetime_from_unix(secs: i64) -> Option<PrimitiveDateTime> {
    OffsetDateTime::from_unix_timestamp(secs)
        .ok()
        .map(|dt| PrimitiveDateTime::new(dt.date(), dt.time()))
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` for embedded documents and maps.
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    /// Short type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::Link(_) => "link",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Borrows the string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a numeric payload as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrows the list payload.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrows the map payload.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Consumes the value, returning the map payload.
    pub fn into_map(self) -> Option<BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Resolves a dotted path through maps and list indices.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(self, |current, part| match current {
            Value::Map(map) => map.get(part),
            Value::List(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Text used inside validator and cast messages: strings are not quoted.
    pub fn plain_text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Converts into plain JSON for the transport boundary.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::DateTime(dt) => serde_json::Value::String(format_datetime(dt)),
            Value::Link(rid) => serde_json::Value::String(rid.to_string()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Renders the value as a dialect literal: strings and dates double-quoted,
/// links bare, containers in JSON-like form.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write_quoted(f, s),
            Value::DateTime(dt) => write_quoted(f, &format_datetime(dt)),
            Value::Link(rid) => write!(f, "{rid}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, key)?;
                    write!(f, ": {item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            other => write!(f, "{other}")?,
        }
    }
    f.write_str("\"")
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value as f64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<RecordId> for Value {
    fn from(value: RecordId) -> Self {
        Value::Link(value)
    }
}

impl From<PrimitiveDateTime> for Value {
    fn from(value: PrimitiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn literals_quote_strings_and_dates() {
        assert_eq!(Value::from("a\"b").to_string(), r#""a\"b""#);
        assert_eq!(
            Value::from(datetime!(2014-03-01 10:20:30)).to_string(),
            "\"2014-03-01 10:20:30\""
        );
        assert_eq!(Value::from(RecordId::new(3, 4)).to_string(), "#3:4");
        let map = Value::from(json!({"b": [1, 2.5], "a": null}));
        assert_eq!(map.to_string(), r#"{"a": null, "b": [1, 2.5]}"#);
    }

    #[test]
    fn json_conversion_prefers_integers() {
        assert_eq!(Value::from(json!(7)), Value::Int(7));
        assert_eq!(Value::from(json!(7.5)), Value::Float(7.5));
        assert_eq!(Value::from(json!("x")).to_json(), json!("x"));
    }

    #[test]
    fn dates_cross_the_json_boundary_as_strings() {
        let value = Value::from(datetime!(2020-01-02 03:04:05));
        assert_eq!(value.to_json(), json!("2020-01-02 03:04:05"));
        assert_eq!(
            parse_datetime("2020-01-02"),
            Some(datetime!(2020-01-02 00:00:00))
        );
    }

    #[test]
    fn tagged_serde_round_trips_datetime() {
        let value = Value::from(datetime!(1999-12-31 23:59:59));
        let text = serde_json::to_string(&value).expect("serialize");
        assert_eq!(text, r#"{"t":"DateTime","v":"1999-12-31 23:59:59"}"#);
        let back: Value = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(back, value);
    }

    #[test]
    fn get_path_walks_maps_and_lists() {
        let value = Value::from(json!({"a": {"b": [10, {"c": true}]}}));
        assert_eq!(value.get_path("a.b.0"), Some(&Value::Int(10)));
        assert_eq!(value.get_path("a.b.1.c"), Some(&Value::Bool(true)));
        assert_eq!(value.get_path("a.x"), None);
    }
}
