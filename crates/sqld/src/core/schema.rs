//! Record declarations and the schemas built from them.
//!
//! A [`RecordDecl`] is the declarative attribute table an application supplies
//! for one record type. Registration turns it into an immutable
//! [`RecordSchema`] with lookups by external key (the name callers use) and by
//! storage key (the column name).

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::converter::Converter;
use super::identifier::{quote_location_pg, validate_identifier};
use super::value::{SemanticType, Value};
use crate::error::{Result, SqldError};

/// A type with a record declaration, registrable by type.
pub trait Record {
    /// Record-type identifier used for registration and lookup.
    fn record_type() -> &'static str;

    /// The attribute table for this record type.
    fn declaration() -> RecordDecl;
}

/// Declaration of one field of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// Field name (documentation and error messages only).
    pub name: String,

    /// External key used in requests and responses.
    #[serde(default)]
    pub json: Option<String>,

    /// Storage key (column name).
    #[serde(default)]
    pub db: Option<String>,

    /// Semantic type. May be omitted when `converter` names the type.
    #[serde(default, rename = "type")]
    pub ty: Option<SemanticType>,

    #[serde(default)]
    pub nullable: bool,

    /// Custom type handled by a registered converter.
    #[serde(default)]
    pub converter: Option<String>,
}

impl FieldDecl {
    /// Declare a field whose external key and storage key are both `name`.
    pub fn new(name: impl Into<String>, ty: SemanticType) -> Self {
        let name = name.into();
        Self {
            json: Some(name.clone()),
            db: Some(name.clone()),
            name,
            ty: Some(ty),
            nullable: false,
            converter: None,
        }
    }

    /// Declare a field carrying no keys; it is skipped at registration.
    pub fn unannotated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            json: None,
            db: None,
            ty: None,
            nullable: false,
            converter: None,
        }
    }

    pub fn json(mut self, key: impl Into<String>) -> Self {
        self.json = Some(key.into());
        self
    }

    pub fn db(mut self, key: impl Into<String>) -> Self {
        self.db = Some(key.into());
        self
    }

    pub fn no_json(mut self) -> Self {
        self.json = None;
        self
    }

    pub fn no_db(mut self) -> Self {
        self.db = None;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn converter(mut self, type_id: impl Into<String>) -> Self {
        self.converter = Some(type_id.into());
        self
    }

    fn is_annotated(&self) -> bool {
        self.json.is_some() || self.db.is_some()
    }

    /// Effective semantic type given the declared type and converter.
    fn resolve_type(&self, record: &str) -> Result<SemanticType> {
        match (&self.ty, &self.converter) {
            (Some(ty), None) => Ok(ty.clone()),
            (None, Some(conv)) => Ok(SemanticType::Custom(conv.clone())),
            (Some(SemanticType::Custom(id)), Some(conv)) if id == conv => {
                Ok(SemanticType::Custom(id.clone()))
            }
            (Some(ty), Some(conv)) => Err(SqldError::Schema(format!(
                "{}.{}: type '{}' conflicts with converter '{}'",
                record, self.name, ty, conv
            ))),
            (None, None) => Err(SqldError::Schema(format!(
                "{}.{}: field declares no type",
                record, self.name
            ))),
        }
    }
}

/// Declarative attribute table for a record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDecl {
    /// Record-type identifier.
    pub name: String,

    /// Storage location (`table` or `schema.table`). Parameter records have none.
    #[serde(default)]
    pub table: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

impl RecordDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            fields: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }
}

/// Resolved description of one annotated field.
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    pub field_name: String,
    pub external_key: String,
    pub storage_key: String,
    pub semantic_type: SemanticType,
    pub nullable: bool,
    pub converter: Option<Arc<dyn Converter>>,
}

impl AttributeDescriptor {
    /// Check a supplied value against this attribute's declared type.
    ///
    /// Types must match exactly unless the attribute is `Any`; NULL is only
    /// accepted for nullable (or `Any`) attributes. Returns the offending
    /// `(got, want)` type names on mismatch.
    pub fn check_compatible(&self, value: &Value) -> std::result::Result<(), (String, String)> {
        let ok = match value.semantic_type() {
            None => self.nullable || self.semantic_type == SemanticType::Any,
            Some(_) if self.semantic_type == SemanticType::Any => true,
            Some(actual) => actual == self.semantic_type,
        };
        if ok {
            Ok(())
        } else {
            Err((value.type_name(), self.semantic_type.to_string()))
        }
    }

    /// Lower a compatible value to what the driver binds.
    pub fn to_native(&self, value: &Value) -> Result<Value> {
        match (&self.converter, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Some(conv), _) => conv.to_raw(value),
            (None, Value::Custom { type_id, .. }) => Err(SqldError::Validation(format!(
                "attribute '{}' has no converter for {}",
                self.external_key, type_id
            ))),
            (None, other) => Ok(other.clone()),
        }
    }
}

/// Immutable schema of a registered record type.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    record_type: String,
    location: Option<String>,
    attributes: Vec<AttributeDescriptor>,
    by_external: HashMap<String, usize>,
    by_storage: HashMap<String, usize>,
}

impl RecordSchema {
    /// Build a schema from a declaration, resolving converters through `converters`.
    pub fn build<F>(decl: &RecordDecl, converters: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<Arc<dyn Converter>>,
    {
        if decl.name.trim().is_empty() {
            return Err(SqldError::Schema(
                "record declaration has an empty record type".to_string(),
            ));
        }
        if decl.fields.is_empty() {
            return Err(SqldError::Schema(format!(
                "'{}' is not a record: it declares no fields",
                decl.name
            )));
        }
        if let Some(table) = &decl.table {
            quote_location_pg(table)?;
        }

        let mut attributes = Vec::new();
        let mut by_external = HashMap::new();
        let mut by_storage = HashMap::new();

        for field in decl.fields.iter().filter(|f| f.is_annotated()) {
            let (external_key, storage_key) = match (&field.json, &field.db) {
                (Some(json), Some(db)) => (json.clone(), db.clone()),
                (None, Some(db)) => {
                    return Err(SqldError::Schema(format!(
                        "{}.{}: storage key '{}' has no external key",
                        decl.name, field.name, db
                    )))
                }
                (Some(json), None) => {
                    return Err(SqldError::Schema(format!(
                        "{}.{}: external key '{}' has no storage key",
                        decl.name, field.name, json
                    )))
                }
                (None, None) => continue,
            };
            if external_key.is_empty() {
                return Err(SqldError::Schema(format!(
                    "{}.{}: external key is empty",
                    decl.name, field.name
                )));
            }
            validate_identifier(&storage_key)?;

            let semantic_type = field.resolve_type(&decl.name)?;
            let converter = match semantic_type.custom_id() {
                Some(id) => Some(converters(id).ok_or_else(|| {
                    SqldError::Schema(format!(
                        "{}.{}: no converter registered for type '{}'",
                        decl.name, field.name, id
                    ))
                })?),
                None => None,
            };

            let idx = attributes.len();
            if by_external.insert(external_key.clone(), idx).is_some() {
                return Err(SqldError::Schema(format!(
                    "{}: duplicate external key '{}'",
                    decl.name, external_key
                )));
            }
            if by_storage.insert(storage_key.clone(), idx).is_some() {
                return Err(SqldError::Schema(format!(
                    "{}: duplicate storage key '{}'",
                    decl.name, storage_key
                )));
            }

            attributes.push(AttributeDescriptor {
                field_name: field.name.clone(),
                external_key,
                storage_key,
                semantic_type,
                nullable: field.nullable,
                converter,
            });
        }

        Ok(Self {
            record_type: decl.name.clone(),
            location: decl.table.clone(),
            attributes,
            by_external,
            by_storage,
        })
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Annotated attributes in declaration order.
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn by_external_key(&self, key: &str) -> Option<&AttributeDescriptor> {
        self.by_external.get(key).map(|&i| &self.attributes[i])
    }

    pub fn by_storage_key(&self, key: &str) -> Option<&AttributeDescriptor> {
        self.by_storage.get(key).map(|&i| &self.attributes[i])
    }
}
