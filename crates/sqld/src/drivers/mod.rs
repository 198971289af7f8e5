//! Database driver implementations.
//!
//! - [`postgres`]: PostgreSQL dialect and the two connection kinds
//! - [`common`]: Shared utilities (TLS)
//!
//! # Static dispatch
//!
//! [`ConnectionImpl`] is an enum over the supported connection kinds rather
//! than a `Box<dyn Connection>`; the compiler generates a match instead of a
//! vtable call.
//!
//! # Adding New Connection Kinds
//!
//! 1. Implement `Connection` for the new adapter
//! 2. Add a variant to `DriverKind` and `ConnectionImpl`
//! 3. Accept the new driver name in config validation

pub mod common;
pub mod postgres;

pub use common::{SslMode, TlsBuilder};
pub use postgres::{PgNativeConnection, PostgresDialect, SqlxConnection};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::ConnectionConfig;
use crate::core::traits::{ColumnSet, Connection, RawRow};
use crate::core::value::Value;
use crate::error::{Result, SqldError};

/// Supported connection kinds, by config name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// deadpool-postgres over tokio-postgres.
    Native,
    /// sqlx `PgPool`.
    Sqlx,
}

impl DriverKind {
    /// Parse a driver name.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedConnection` if the name is not recognized.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "native" | "postgres" | "tokio-postgres" => Ok(DriverKind::Native),
            "sqlx" => Ok(DriverKind::Sqlx),
            other => Err(SqldError::UnsupportedConnection(format!(
                "'{}'. Supported drivers: native, sqlx",
                other
            ))),
        }
    }
}

/// Enum-based static dispatch over connection kinds.
pub enum ConnectionImpl {
    Native(PgNativeConnection),
    Sqlx(SqlxConnection),
}

impl ConnectionImpl {
    /// Connect using the configured driver.
    ///
    /// An unknown driver name fails before anything connects.
    pub async fn from_config(config: &ConnectionConfig) -> Result<Self> {
        match DriverKind::parse(&config.driver)? {
            DriverKind::Native => Ok(ConnectionImpl::Native(
                PgNativeConnection::new(config).await?,
            )),
            DriverKind::Sqlx => Ok(ConnectionImpl::Sqlx(SqlxConnection::new(config).await?)),
        }
    }
}

#[async_trait]
impl Connection for ConnectionImpl {
    fn kind(&self) -> &str {
        match self {
            ConnectionImpl::Native(c) => c.kind(),
            ConnectionImpl::Sqlx(c) => c.kind(),
        }
    }

    async fn query(
        &self,
        cancel: &CancellationToken,
        sql: &str,
        args: &[Value],
        columns: &ColumnSet,
    ) -> Result<Vec<RawRow>> {
        match self {
            ConnectionImpl::Native(c) => c.query(cancel, sql, args, columns).await,
            ConnectionImpl::Sqlx(c) => c.query(cancel, sql, args, columns).await,
        }
    }

    async fn ping(&self) -> Result<()> {
        match self {
            ConnectionImpl::Native(c) => c.ping().await,
            ConnectionImpl::Sqlx(c) => c.ping().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_kind_parse() {
        assert_eq!(DriverKind::parse("native").unwrap(), DriverKind::Native);
        assert_eq!(DriverKind::parse("SQLX").unwrap(), DriverKind::Sqlx);
        assert_eq!(DriverKind::parse("postgres").unwrap(), DriverKind::Native);
    }

    #[tokio::test]
    async fn test_unknown_driver_fails_before_connecting() {
        let config = ConnectionConfig {
            driver: "odbc".to_string(),
            host: "db.invalid".to_string(),
            port: 5432,
            database: "app".to_string(),
            user: "app".to_string(),
            password: String::new(),
            ssl_mode: "disable".to_string(),
            max_connections: 1,
            statement_timeout_ms: None,
        };
        let err = ConnectionImpl::from_config(&config).await.err().unwrap();
        assert!(matches!(err, SqldError::UnsupportedConnection(_)));
        assert!(err.to_string().contains("'odbc'"));
    }
}
