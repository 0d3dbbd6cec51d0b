//! Value and event types for rivven-sqlbeat
//!
//! - `ColumnValue`: the classified value of one result cell
//! - `Event`: one telemetry record handed to a publisher
//! - `SensitiveString`: a credential that never shows up in logs

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Field name carrying the event timestamp in encoded events
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// Field name carrying the event kind in encoded events
pub const KIND_FIELD: &str = "type";

/// Prepended to a data field named like a built-in field
pub const RESERVED_FIELD_PREFIX: &str = "_";

/// Classified value of a single result cell
///
/// SQL NULL has no variant of its own: it arrives as an empty cell and is
/// classified as `String("")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point
    Float(f64),
    /// Raw text, unmodified
    String(String),
}

impl ColumnValue {
    /// Short name of the classification, used in logs
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }

    /// Whether the value is an integer or a float
    #[inline]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    /// Get the integer, if this is one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the float, if this is one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the text, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Whether `other` has the same classification as `self`
    #[inline]
    pub fn same_type(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for ColumnValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl std::fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

/// A telemetry event
///
/// Carries two built-in fields (timestamp and kind) plus an ordered set of
/// data fields. An event without data fields is never published.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    timestamp: DateTime<Utc>,
    kind: String,
    fields: IndexMap<String, ColumnValue>,
}

impl Event {
    /// Create an event with no data fields
    pub fn new(kind: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            kind: kind.into(),
            fields: IndexMap::new(),
        }
    }

    /// Event timestamp
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Event kind tag
    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Set a data field, replacing any earlier value under the same name
    ///
    /// A replaced field keeps its original position. A name equal to a
    /// built-in field (`@timestamp`, `type`) is stored with
    /// `RESERVED_FIELD_PREFIX` in front, so `type` becomes `_type`.
    pub fn insert(&mut self, name: impl Into<String>, value: ColumnValue) {
        let mut name = name.into();
        if is_reserved(&name) {
            name.insert_str(0, RESERVED_FIELD_PREFIX);
        }
        self.fields.insert(name, value);
    }

    /// Set a data field (builder-style)
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.insert(name, value.into());
        self
    }

    /// Get a data field by name
    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.fields.get(name)
    }

    /// Whether a data field is present
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Data fields in insertion order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of data fields (built-in fields excluded)
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the event carries no data fields
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether the event should be handed to a publisher
    #[inline]
    pub fn is_publishable(&self) -> bool {
        !self.is_empty()
    }
}

fn is_reserved(name: &str) -> bool {
    name == TIMESTAMP_FIELD || name == KIND_FIELD
}

/// Encodes as a flat map: `@timestamp`, `type`, then data fields in order
impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 2))?;
        map.serialize_entry(TIMESTAMP_FIELD, &self.timestamp)?;
        map.serialize_entry(KIND_FIELD, &self.kind)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A string holding a credential
///
/// Debug, Display and Serialize all print a redaction marker.
#[derive(Clone)]
pub struct SensitiveString(SecretString);

impl SensitiveString {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into().into_boxed_str()))
    }

    /// Expose the secret value.
    ///
    /// Only for handing the credential to the driver.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SensitiveString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SensitiveString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for SensitiveString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***REDACTED***")
    }
}

impl<'de> Deserialize<'de> for SensitiveString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_column_value_accessors() {
        assert_eq!(ColumnValue::Integer(7).as_i64(), Some(7));
        assert_eq!(ColumnValue::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(ColumnValue::from("x").as_str(), Some("x"));
        assert_eq!(ColumnValue::Integer(7).as_f64(), None);

        assert!(ColumnValue::Integer(1).is_numeric());
        assert!(!ColumnValue::from("1").is_numeric());
    }

    #[test]
    fn test_column_value_same_type() {
        assert!(ColumnValue::Integer(1).same_type(&ColumnValue::Integer(9)));
        assert!(!ColumnValue::Integer(1).same_type(&ColumnValue::Float(1.0)));
    }

    #[test]
    fn test_event_fields_keep_order_on_replace() {
        let mut event = Event::new("sqlbeat", ts())
            .with_field("b", 1_i64)
            .with_field("a", "x");
        event.insert("b", ColumnValue::Integer(2));

        let names: Vec<_> = event.fields().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(event.get("b"), Some(&ColumnValue::Integer(2)));
        assert_eq!(event.len(), 2);
    }

    #[test]
    fn test_empty_event_not_publishable() {
        let event = Event::new("sqlbeat", ts());
        assert!(event.is_empty());
        assert!(!event.is_publishable());
    }

    #[test]
    fn test_event_serializes_flat() {
        let event = Event::new("sqlbeat", ts())
            .with_field("threads", 4_i64)
            .with_field("ratio", 0.25_f64)
            .with_field("state", "ok");

        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"@timestamp":"2024-05-01T12:00:00Z","type":"sqlbeat","threads":4,"ratio":0.25,"state":"ok"}"#
        );
    }

    #[test]
    fn test_builtin_names_not_duplicated() {
        let event = Event::new("sqlbeat", ts())
            .with_field("type", "InnoDB")
            .with_field("@timestamp", "x")
            .with_field("n", 1_i64);

        assert!(!event.contains("type"));
        assert_eq!(event.get("_type"), Some(&ColumnValue::String("InnoDB".into())));
        assert_eq!(event.get("_@timestamp"), Some(&ColumnValue::String("x".into())));
        assert_eq!(event.kind(), "sqlbeat");

        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"@timestamp":"2024-05-01T12:00:00Z","type":"sqlbeat","_type":"InnoDB","_@timestamp":"x","n":1}"#
        );

        let decoded: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.len(), 5);
        assert_eq!(decoded["type"], "sqlbeat");
    }

    #[test]
    fn test_sensitive_string_redacted() {
        let secret = SensitiveString::new("hunter2");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(secret.to_string(), "[REDACTED]");
        assert_eq!(
            serde_json::to_string(&secret).unwrap(),
            "\"***REDACTED***\""
        );
        assert_eq!(secret.expose_secret(), "hunter2");
    }
}
