//! TLS configuration for PostgreSQL connections.
//!
//! Both connection kinds read the same `ssl_mode` setting: the native pool
//! gets a rustls connector, the sqlx pool gets the matching `PgSslMode`.

use rustls::ClientConfig;
use sqlx::postgres::PgSslMode;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::info;

use crate::error::{Result, SqldError};

/// SSL modes, named after PostgreSQL's `sslmode` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// No SSL/TLS (plain TCP connection).
    #[default]
    Disable,
    /// TLS with the server certificate checked against the webpki roots.
    ///
    /// Hostname and chain are verified for both connection kinds, so sqlx is
    /// given `VerifyFull` rather than its unverified `Require`.
    Require,
    /// Full certificate and hostname verification.
    VerifyFull,
}

impl SslMode {
    /// Parse an SSL mode from a string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "disable" | "" => Ok(SslMode::Disable),
            "require" => Ok(SslMode::Require),
            "verify-full" => Ok(SslMode::VerifyFull),
            other => Err(SqldError::Config(format!(
                "Invalid ssl_mode '{}'. Valid values: disable, require, verify-full",
                other
            ))),
        }
    }

    /// Check if this mode requires TLS.
    pub fn requires_tls(&self) -> bool {
        !matches!(self, SslMode::Disable)
    }

    /// Equivalent sqlx mode.
    pub fn to_sqlx(self) -> PgSslMode {
        match self {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Require | SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

/// Builder for native PostgreSQL TLS connectors.
pub struct TlsBuilder {
    ssl_mode: SslMode,
}

impl TlsBuilder {
    /// Create a new TLS builder with the given SSL mode.
    pub fn new(ssl_mode: SslMode) -> Self {
        Self { ssl_mode }
    }

    /// Build a MakeRustlsConnect instance for use with deadpool-postgres.
    ///
    /// Returns None if TLS is disabled.
    pub fn build(&self) -> Result<Option<MakeRustlsConnect>> {
        if !self.ssl_mode.requires_tls() {
            return Ok(None);
        }
        Ok(Some(MakeRustlsConnect::new(self.build_client_config()?)))
    }

    /// Build the underlying rustls ClientConfig.
    pub fn build_client_config(&self) -> Result<ClientConfig> {
        if !self.ssl_mode.requires_tls() {
            return Err(SqldError::Config(
                "Cannot build TLS config for ssl_mode=disable".into(),
            ));
        }

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        info!("ssl_mode={:?}: server certificate verification enabled", self.ssl_mode);
        Ok(ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_mode_parsing() {
        assert_eq!(SslMode::parse("disable").unwrap(), SslMode::Disable);
        assert_eq!(SslMode::parse("REQUIRE").unwrap(), SslMode::Require);
        assert_eq!(SslMode::parse("verify-full").unwrap(), SslMode::VerifyFull);
        assert_eq!(SslMode::parse("").unwrap(), SslMode::Disable);
        assert!(SslMode::parse("verify-ca").is_err());
    }

    #[test]
    fn test_sqlx_mapping() {
        assert!(matches!(SslMode::Disable.to_sqlx(), PgSslMode::Disable));
        assert!(matches!(SslMode::VerifyFull.to_sqlx(), PgSslMode::VerifyFull));
        assert!(matches!(SslMode::Require.to_sqlx(), PgSslMode::VerifyFull));
    }

    #[test]
    fn test_tls_builder_disable_returns_none() {
        assert!(TlsBuilder::new(SslMode::Disable).build().unwrap().is_none());
        assert!(TlsBuilder::new(SslMode::Disable).build_client_config().is_err());
    }

    #[test]
    fn test_tls_builder_verify_full_returns_some() {
        assert!(TlsBuilder::new(SslMode::VerifyFull).build().unwrap().is_some());
        assert!(TlsBuilder::new(SslMode::Require).build().unwrap().is_some());
    }
}
