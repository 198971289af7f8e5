//! Converters for custom semantic types.
//!
//! A converter makes an application-defined type first-class: values of the
//! custom type are lowered to a driver-native value before binding and lifted
//! back when rows are scanned.

use std::fmt;

use super::value::{SemanticType, Value};
use crate::error::{Result, SqldError};

/// Bidirectional mapping between a custom semantic type and a native one.
pub trait Converter: Send + Sync + fmt::Debug {
    /// Custom type id this converter handles.
    fn type_id(&self) -> &str;

    /// Native semantic type the driver delivers and accepts.
    fn native_type(&self) -> SemanticType;

    /// Lift a driver-native value into the custom type.
    ///
    /// NULL is never passed in; the scanner handles nullability.
    fn from_raw(&self, raw: Value) -> Result<Value>;

    /// Lower a custom-typed value into a driver-native value.
    fn to_raw(&self, value: &Value) -> Result<Value>;
}

/// Converter for a thin wrapper over a single native type, such as an
/// employee identifier stored as an integer.
#[derive(Debug, Clone)]
pub struct NewtypeConverter {
    type_id: String,
    native: SemanticType,
}

impl NewtypeConverter {
    /// Create a converter. The native type must be a built-in type.
    pub fn new(type_id: impl Into<String>, native: SemanticType) -> Result<Self> {
        let type_id = type_id.into();
        if !native.is_native() {
            return Err(SqldError::Schema(format!(
                "converter '{}' must wrap a native type, got '{}'",
                type_id, native
            )));
        }
        if SemanticType::parse(&type_id).custom_id().is_none() {
            return Err(SqldError::Schema(format!(
                "converter type id '{}' shadows a built-in type",
                type_id
            )));
        }
        Ok(Self { type_id, native })
    }
}

impl Converter for NewtypeConverter {
    fn type_id(&self) -> &str {
        &self.type_id
    }

    fn native_type(&self) -> SemanticType {
        self.native.clone()
    }

    fn from_raw(&self, raw: Value) -> Result<Value> {
        match raw.semantic_type() {
            Some(ty) if ty == self.native => Ok(Value::Custom {
                type_id: self.type_id.clone(),
                value: Box::new(raw),
            }),
            _ => Err(SqldError::Validation(format!(
                "{} expects a {} value, got {}",
                self.type_id,
                self.native,
                raw.type_name()
            ))),
        }
    }

    fn to_raw(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Custom { type_id, value } if *type_id == self.type_id => {
                match value.semantic_type() {
                    Some(ty) if ty == self.native => Ok((**value).clone()),
                    _ => Err(SqldError::Validation(format!(
                        "{} wraps {}, want {}",
                        self.type_id,
                        value.type_name(),
                        self.native
                    ))),
                }
            }
            other => Err(SqldError::Validation(format!(
                "{} cannot convert a {} value",
                self.type_id,
                other.type_name()
            ))),
        }
    }
}
