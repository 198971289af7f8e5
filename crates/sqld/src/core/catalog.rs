//! Record and converter catalog for explicit dependency injection.
//!
//! The [`Catalog`] owns the schema registry and the converter registry. It is
//! built at startup, sealed, and passed explicitly to whatever serves
//! requests, rather than living in a process-wide global.
//!
//! ```rust,ignore
//! let catalog = Catalog::new();
//! catalog.register_converter(NewtypeConverter::new("employee_id", SemanticType::Integer)?)?;
//! catalog.register::<Employee>()?;
//! catalog.seal();
//! let engine = QueryEngine::new(Arc::new(catalog));
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::converter::Converter;
use super::schema::{Record, RecordDecl, RecordSchema};
use crate::error::{Result, SqldError};

/// Registry of record schemas and custom-type converters.
#[derive(Default)]
pub struct Catalog {
    schemas: RwLock<HashMap<String, Arc<RecordSchema>>>,
    converters: RwLock<HashMap<String, Arc<dyn Converter>>>,
    sealed: AtomicBool,
}

impl Catalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter for its custom type id.
    ///
    /// Converters must be registered before the records that use them.
    pub fn register_converter(&self, converter: impl Converter + 'static) -> Result<()> {
        self.register_converter_arc(Arc::new(converter))
    }

    /// Register a converter as an Arc (for sharing).
    pub fn register_converter_arc(&self, converter: Arc<dyn Converter>) -> Result<()> {
        self.ensure_open("converter", converter.type_id())?;
        let id = converter.type_id().to_string();
        debug!("Registered converter {} over {}", id, converter.native_type());
        self.converters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, converter);
        Ok(())
    }

    /// Look up the converter for a custom type id.
    pub fn converter(&self, type_id: &str) -> Option<Arc<dyn Converter>> {
        self.converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_id)
            .cloned()
    }

    /// Register a record type by its [`Record`] implementation.
    pub fn register<T: Record>(&self) -> Result<Arc<RecordSchema>> {
        let decl = T::declaration();
        if decl.name != T::record_type() {
            return Err(SqldError::Schema(format!(
                "declaration name '{}' does not match record type '{}'",
                decl.name,
                T::record_type()
            )));
        }
        self.register_decl(&decl)
    }

    /// Register a record type from its declaration.
    ///
    /// Re-registering a record type replaces the previous schema.
    pub fn register_decl(&self, decl: &RecordDecl) -> Result<Arc<RecordSchema>> {
        self.ensure_open("record", &decl.name)?;
        let schema = Arc::new(RecordSchema::build(decl, |id| self.converter(id))?);

        let replaced = self
            .schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(decl.name.clone(), schema.clone());
        if replaced.is_some() {
            debug!("Replaced schema for {}", decl.name);
        } else {
            debug!(
                "Registered {} with {} attributes",
                decl.name,
                schema.attribute_count()
            );
        }
        Ok(schema)
    }

    /// Look up a registered schema by record-type id.
    pub fn lookup(&self, record_type: &str) -> Result<Arc<RecordSchema>> {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(record_type)
            .cloned()
            .ok_or_else(|| SqldError::NotRegistered(record_type.to_string()))
    }

    /// Look up a registered schema by its [`Record`] type.
    pub fn lookup_type<T: Record>(&self) -> Result<Arc<RecordSchema>> {
        self.lookup(T::record_type())
    }

    /// Registered record types, sorted.
    pub fn record_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Registered converter ids, sorted.
    pub fn converter_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Close the catalog to further registration.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    fn ensure_open(&self, what: &str, name: &str) -> Result<()> {
        if self.is_sealed() {
            return Err(SqldError::Schema(format!(
                "catalog is sealed; cannot register {} '{}'",
                what, name
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("records", &self.record_types())
            .field("converters", &self.converter_ids())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}
