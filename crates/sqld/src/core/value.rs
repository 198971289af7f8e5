//! Value types shared by filters, raw-query parameters and result rows.
//!
//! Every value a caller supplies or a driver returns is one variant of the
//! closed [`Value`] union, so compatibility checks against a declared
//! [`SemanticType`] are exhaustive matches instead of runtime type probing.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};

use crate::error::{Result, SqldError};

/// Key used to tag an explicitly typed JSON value.
const TYPE_TAG: &str = "$type";

/// Logical type of an attribute or value.
///
/// Parsed from and printed as lower-case names; any name that is not one of
/// the built-in types names a custom (converter-backed) type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SemanticType {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
    /// Accepts a value of any type.
    Any,
    /// Converter-backed type, identified by its registered id.
    Custom(String),
}

impl SemanticType {
    /// Parse a type name (`"integer"`, `"timestamp"`, `"employee_id"`, ...).
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "string" | "text" => SemanticType::String,
            "integer" | "int" => SemanticType::Integer,
            "float" | "double" => SemanticType::Float,
            "boolean" | "bool" => SemanticType::Boolean,
            "timestamp" => SemanticType::Timestamp,
            "any" => SemanticType::Any,
            _ => SemanticType::Custom(name.trim().to_string()),
        }
    }

    /// Whether the driver can read and bind this type without a converter.
    pub fn is_native(&self) -> bool {
        !matches!(self, SemanticType::Custom(_) | SemanticType::Any)
    }

    /// The custom type id, if this is a custom type.
    pub fn custom_id(&self) -> Option<&str> {
        match self {
            SemanticType::Custom(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::String => f.write_str("string"),
            SemanticType::Integer => f.write_str("integer"),
            SemanticType::Float => f.write_str("float"),
            SemanticType::Boolean => f.write_str("boolean"),
            SemanticType::Timestamp => f.write_str("timestamp"),
            SemanticType::Any => f.write_str("any"),
            SemanticType::Custom(id) => f.write_str(id),
        }
    }
}

impl From<String> for SemanticType {
    fn from(name: String) -> Self {
        SemanticType::parse(&name)
    }
}

impl From<SemanticType> for String {
    fn from(ty: SemanticType) -> Self {
        ty.to_string()
    }
}

impl<'de> Deserialize<'de> for SemanticType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(SemanticType::parse(&name))
    }
}

impl Serialize for SemanticType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A dynamically typed filter, parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// A converter-backed value: the custom type id plus the native value it wraps.
    Custom { type_id: String, value: Box<Value> },
}

impl Value {
    /// Wrap a native value as a custom-typed value.
    pub fn custom(type_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Value::Custom {
            type_id: type_id.into(),
            value: Box::new(value.into()),
        }
    }

    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime semantic type; `None` for NULL.
    #[must_use]
    pub fn semantic_type(&self) -> Option<SemanticType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(SemanticType::Boolean),
            Value::Integer(_) => Some(SemanticType::Integer),
            Value::Float(_) => Some(SemanticType::Float),
            Value::Text(_) => Some(SemanticType::String),
            Value::Timestamp(_) => Some(SemanticType::Timestamp),
            Value::Custom { type_id, .. } => Some(SemanticType::Custom(type_id.clone())),
        }
    }

    /// Name of the runtime type, as used in error messages.
    pub fn type_name(&self) -> String {
        self.semantic_type()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "null".to_string())
    }

    /// Decode a JSON value.
    ///
    /// Integral numbers become `Integer` (rejected past `i64::MAX`), other
    /// numbers `Float`. Explicitly typed values use
    /// `{"$type": "<type>", "value": ...}`.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else if n.is_u64() {
                    Err(SqldError::Validation(format!(
                        "integer {} is out of range for a 64-bit integer",
                        n
                    )))
                } else {
                    n.as_f64().map(Value::Float).ok_or_else(|| {
                        SqldError::Validation(format!("number {} is out of range", n))
                    })
                }
            }
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            serde_json::Value::Object(mut obj) => {
                let tag = match obj.remove(TYPE_TAG) {
                    Some(serde_json::Value::String(tag)) => tag,
                    _ => {
                        return Err(SqldError::Validation(format!(
                            "objects are only accepted as typed values ({{\"{}\": ..., \"value\": ...}})",
                            TYPE_TAG
                        )))
                    }
                };
                let inner = obj.remove("value").unwrap_or(serde_json::Value::Null);
                Self::from_typed_json(SemanticType::parse(&tag), inner)
            }
            serde_json::Value::Array(_) => Err(SqldError::Validation(
                "array values are not supported".to_string(),
            )),
        }
    }

    fn from_typed_json(ty: SemanticType, inner: serde_json::Value) -> Result<Self> {
        match ty {
            SemanticType::Timestamp => {
                let text = inner.as_str().ok_or_else(|| {
                    SqldError::Validation("timestamp values must be RFC 3339 strings".into())
                })?;
                let parsed = DateTime::parse_from_rfc3339(text).map_err(|e| {
                    SqldError::Validation(format!("invalid timestamp {:?}: {}", text, e))
                })?;
                Ok(Value::Timestamp(parsed.with_timezone(&Utc)))
            }
            SemanticType::Custom(type_id) => Ok(Value::Custom {
                type_id,
                value: Box::new(Self::from_json(inner)?),
            }),
            SemanticType::Any => Self::from_json(inner),
            native => {
                let value = Self::from_json(inner)?;
                match value.semantic_type() {
                    Some(actual) if actual == native => Ok(value),
                    None => Ok(value),
                    Some(actual) => Err(SqldError::Validation(format!(
                        "typed value declared as {} but holds {}",
                        native, actual
                    ))),
                }
            }
        }
    }

    /// Encode as plain JSON (custom values encode as their inner value).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            Value::Custom { value, .. } => value.to_json(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::Custom { type_id, value } => write!(f, "{}({})", type_id, value),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(json).map_err(de::Error::custom)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_semantic_type_parse_and_display() {
        assert_eq!(SemanticType::parse("integer"), SemanticType::Integer);
        assert_eq!(SemanticType::parse("BOOL"), SemanticType::Boolean);
        assert_eq!(SemanticType::parse("any"), SemanticType::Any);
        assert_eq!(
            SemanticType::parse("employee_id"),
            SemanticType::Custom("employee_id".to_string())
        );
        assert_eq!(SemanticType::Timestamp.to_string(), "timestamp");
        assert!(SemanticType::Float.is_native());
        assert!(!SemanticType::Custom("x".into()).is_native());
    }

    #[test]
    fn test_runtime_types() {
        assert_eq!(Value::from(42i64).semantic_type(), Some(SemanticType::Integer));
        assert_eq!(Value::from(4.5).semantic_type(), Some(SemanticType::Float));
        assert_eq!(Value::Null.semantic_type(), None);
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::custom("employee_id", 7i64).type_name(), "employee_id");
    }

    #[test]
    fn test_from_json_numbers_are_not_coerced() {
        assert_eq!(Value::from_json(json!(50000)).unwrap(), Value::Integer(50000));
        assert_eq!(Value::from_json(json!(50000.5)).unwrap(), Value::Float(50000.5));
        assert_eq!(Value::from_json(json!("Eng")).unwrap(), Value::Text("Eng".into()));
        assert!(Value::from_json(json!([1, 2])).is_err());
        assert!(Value::from_json(json!({"a": 1})).is_err());
    }

    #[test]
    fn test_from_json_rejects_integer_overflow() {
        assert_eq!(
            Value::from_json(json!(i64::MAX)).unwrap(),
            Value::Integer(i64::MAX)
        );
        let err = Value::from_json(json!(u64::MAX)).unwrap_err();
        assert!(matches!(err, SqldError::Validation(_)));
        assert!(err.to_string().contains("18446744073709551615"));
    }

    #[test]
    fn test_from_json_typed_values() {
        let ts = Value::from_json(json!({"$type": "timestamp", "value": "2024-03-01T10:00:00Z"}))
            .unwrap();
        assert_eq!(
            ts,
            Value::Timestamp(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );

        let id = Value::from_json(json!({"$type": "employee_id", "value": 12})).unwrap();
        assert_eq!(id, Value::custom("employee_id", 12i64));

        let wrong = Value::from_json(json!({"$type": "integer", "value": "12"}));
        assert!(wrong.is_err());
    }

    #[test]
    fn test_serialize_plain_json() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(
            serde_json::to_value(Value::Timestamp(ts)).unwrap(),
            json!("2024-03-01T10:00:00+00:00")
        );
        assert_eq!(
            serde_json::to_value(Value::custom("employee_id", 9i64)).unwrap(),
            json!(9)
        );
        assert_eq!(serde_json::to_value(Value::Float(f64::NAN)).unwrap(), json!(null));
    }
}
