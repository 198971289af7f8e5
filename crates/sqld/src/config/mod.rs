//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use crate::core::catalog::Catalog;
use crate::core::converter::NewtypeConverter;
use crate::core::value::SemanticType;
use crate::error::Result;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Build a catalog holding the declared converters and records.
    ///
    /// The catalog is returned unsealed so callers can add their own
    /// [`Record`](crate::core::Record) types before sealing it.
    pub fn build_catalog(&self) -> Result<Catalog> {
        let catalog = Catalog::new();
        for converter in &self.converters {
            catalog.register_converter(NewtypeConverter::new(
                converter.type_id.clone(),
                SemanticType::parse(&converter.native),
            )?)?;
        }
        for record in &self.records {
            catalog.register_decl(record)?;
        }
        Ok(catalog)
    }
}
