//! Core abstractions shared by both request styles.
//!
//! - [`value`]: the value model and semantic types
//! - [`identifier`]: identifier validation and quoting
//! - [`schema`]: record declarations and registered schemas
//! - [`converter`]: custom semantic type converters
//! - [`catalog`]: the schema and converter registry
//! - [`traits`]: the `Dialect` and `Connection` seams

pub mod catalog;
pub mod converter;
pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use catalog::Catalog;
pub use converter::{Converter, NewtypeConverter};
pub use schema::{AttributeDescriptor, FieldDecl, Record, RecordDecl, RecordSchema};
pub use traits::{ColumnSet, Connection, Dialect, RawRow};
pub use value::{SemanticType, Value};
