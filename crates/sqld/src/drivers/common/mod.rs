//! Common utilities shared across connection kinds.
//!
//! - [`tls`]: TLS configuration for PostgreSQL connections

pub mod tls;

pub use tls::{SslMode, TlsBuilder};
