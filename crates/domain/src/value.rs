//! Typed field values read from objects and attached to them as metadata
//! or custom attributes.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// A single typed field value.
///
/// Multi-valued fields (subject alternative names, multi-valued custom
/// attributes) are represented as [`FieldValue::List`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(Timestamp),
    String(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Human-readable name of the value's type, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::Float(_) => "number",
            Self::DateTime(_) => "date",
            Self::String(_) => "string",
            Self::List(_) => "list",
        }
    }

    /// `true` for null, blank strings and empty lists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty() || items.iter().all(Self::is_empty),
            _ => false,
        }
    }

    /// The scalar elements of this value: the list items for a list,
    /// otherwise the value itself.
    #[must_use]
    pub fn elements(&self) -> Vec<&FieldValue> {
        match self {
            Self::List(items) => items.iter().flat_map(Self::elements).collect(),
            other => vec![other],
        }
    }

    /// Convert an untyped JSON value into a field value.
    ///
    /// Strings stay strings; date coercion happens at comparison time
    /// where the field type is known.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(_) => Self::String(value.to_string()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::String)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(value: Timestamp) -> Self {
        Self::DateTime(value)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::DateTime(ts) => write!(f, "{}", ts.to_rfc3339()),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_null_variant_as_json_null() {
        let json = serde_json::to_string(&FieldValue::Null).unwrap();
        assert_eq!(json, "null");
    }

    #[test]
    fn should_deserialize_rfc3339_string_as_date() {
        let val: FieldValue = serde_json::from_str("\"2030-01-01T00:00:00Z\"").unwrap();
        assert!(matches!(val, FieldValue::DateTime(_)));
    }

    #[test]
    fn should_deserialize_plain_string_as_string() {
        let val: FieldValue = serde_json::from_str("\"Staging\"").unwrap();
        assert_eq!(val, FieldValue::String("Staging".to_string()));
    }

    #[test]
    fn should_treat_blank_string_and_empty_list_as_empty() {
        assert!(FieldValue::Null.is_empty());
        assert!(FieldValue::String("   ".to_string()).is_empty());
        assert!(FieldValue::List(vec![]).is_empty());
        assert!(!FieldValue::Int(0).is_empty());
        assert!(!FieldValue::List(vec!["a".into()]).is_empty());
    }

    #[test]
    fn should_flatten_nested_lists_into_elements() {
        let val = FieldValue::List(vec![
            "a".into(),
            FieldValue::List(vec!["b".into(), "c".into()]),
        ]);
        assert_eq!(val.elements().len(), 3);
    }

    #[test]
    fn should_convert_json_numbers_to_int_or_float() {
        assert_eq!(
            FieldValue::from_json(&serde_json::json!(42)),
            FieldValue::Int(42)
        );
        assert_eq!(
            FieldValue::from_json(&serde_json::json!(1.5)),
            FieldValue::Float(1.5)
        );
    }
}
