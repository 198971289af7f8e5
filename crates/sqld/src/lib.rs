//! # sqld
//!
//! Schema-checked SQL requests over PostgreSQL.
//!
//! A caller describes a data request either as a structured request (fields,
//! equality filters, ordering, pagination) or as a raw statement with
//! `{{name}}` placeholders. The request is validated against a registered
//! record schema, turned into a positional, parameterized statement, executed
//! on a pluggable [`Connection`], and projected onto only the requested
//! attributes.
//!
//! - **Record schemas** declared in Rust ([`Record`]) or YAML
//! - **Custom semantic types** through registered converters
//! - **Two connection kinds**: deadpool/tokio-postgres and sqlx
//! - **Cancellation** via `CancellationToken` plus an optional deadline
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sqld::{Config, ConnectionImpl, QueryEngine, QueryRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> sqld::Result<()> {
//!     let config = Config::load("sqld.yaml")?;
//!     let catalog = config.build_catalog()?;
//!     catalog.seal();
//!
//!     let engine = QueryEngine::new(Arc::new(catalog))?
//!         .with_timeout(config.connection.statement_timeout());
//!     let conn = ConnectionImpl::from_config(&config.connection).await?;
//!
//!     let request = QueryRequest::select(["id", "name"]).filter("active", true);
//!     let response = engine
//!         .query(&CancellationToken::new(), &conn, "employee", &request)
//!         .await?;
//!     println!("{}", serde_json::to_string(&response)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod engine;
pub mod error;
pub mod exec;
pub mod query;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig, ConverterConfig};
pub use core::{
    AttributeDescriptor, Catalog, ColumnSet, Connection, Converter, Dialect, FieldDecl,
    NewtypeConverter, RawRow, Record, RecordDecl, RecordSchema, SemanticType, Value,
};
pub use drivers::{ConnectionImpl, DriverKind, PgNativeConnection, PostgresDialect, SqlxConnection};
pub use engine::QueryEngine;
pub use error::{ErrorKind, Result, SqldError};
pub use exec::{ScanPlan, TypedRecord};
pub use query::{
    OrderBy, PaginationRequest, ParamMap, PlannedQuery, QueryRequest, QueryResponse, Row,
    Statement,
};
