//! Configuration type definitions.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::schema::RecordDecl;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection.
    pub connection: ConnectionConfig,

    /// Custom types, registered before records.
    #[serde(default)]
    pub converters: Vec<ConverterConfig>,

    /// Record declarations.
    #[serde(default)]
    pub records: Vec<RecordDecl>,
}

/// PostgreSQL connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Connection kind: "native" (tokio-postgres pool) or "sqlx".
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password. Never serialized.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// SSL mode (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,

    /// Pool size (default: 8).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Per-statement deadline in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_timeout_ms: Option<u64>,
}

impl ConnectionConfig {
    /// Per-statement deadline, if configured.
    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_ms.map(Duration::from_millis)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .finish()
    }
}

/// A newtype converter declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Custom type id.
    #[serde(rename = "type")]
    pub type_id: String,

    /// Native type it wraps (e.g., "integer").
    pub native: String,
}

fn default_driver() -> String {
    "native".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_max_connections() -> usize {
    8
}
