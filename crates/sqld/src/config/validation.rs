//! Configuration validation.

use std::collections::HashSet;

use super::Config;
use crate::core::value::SemanticType;
use crate::drivers::common::SslMode;
use crate::drivers::DriverKind;
use crate::error::{Result, SqldError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    let conn = &config.connection;
    if conn.host.is_empty() {
        return Err(SqldError::Config("connection.host is required".into()));
    }
    if conn.database.is_empty() {
        return Err(SqldError::Config("connection.database is required".into()));
    }
    if conn.user.is_empty() {
        return Err(SqldError::Config("connection.user is required".into()));
    }
    if conn.port == 0 {
        return Err(SqldError::Config("connection.port must be non-zero".into()));
    }
    if conn.max_connections == 0 {
        return Err(SqldError::Config(
            "connection.max_connections must be at least 1".into(),
        ));
    }
    if DriverKind::parse(&conn.driver).is_err() {
        return Err(SqldError::Config(format!(
            "connection.driver must be 'native' or 'sqlx', got '{}'",
            conn.driver
        )));
    }
    SslMode::parse(&conn.ssl_mode)?;

    for converter in &config.converters {
        if SemanticType::parse(&converter.type_id).custom_id().is_none() {
            return Err(SqldError::Config(format!(
                "converter type '{}' shadows a built-in type",
                converter.type_id
            )));
        }
        if !SemanticType::parse(&converter.native).is_native() {
            return Err(SqldError::Config(format!(
                "converter '{}' must wrap a native type, got '{}'",
                converter.type_id, converter.native
            )));
        }
    }

    let mut names = HashSet::new();
    for record in &config.records {
        if !names.insert(record.name.as_str()) {
            return Err(SqldError::Config(format!(
                "record '{}' is declared more than once",
                record.name
            )));
        }
    }

    Ok(())
}
