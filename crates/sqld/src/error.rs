//! Error types for the query library.

use std::time::Duration;

use thiserror::Error;

/// Main error type for schema registration, validation and execution.
#[derive(Error, Debug)]
pub enum SqldError {
    /// Record declaration is invalid (raised at registration time).
    #[error("Schema error: {0}")]
    Schema(String),

    /// A record type was looked up before it was registered.
    #[error("Record type not registered: {0}")]
    NotRegistered(String),

    /// Request failed validation; nothing was sent to the database.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Placeholder rewriting produced an inconsistent statement.
    #[error("Rewrite failed: {0}")]
    Rewrite(String),

    /// Native PostgreSQL driver error
    #[error("Database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// sqlx driver error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Statement could not be handed to the driver (argument binding etc.)
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Connection kind has no adapter
    #[error("Unsupported connection type: {0}")]
    UnsupportedConnection(String),

    /// Statement was cancelled through its cancellation token
    #[error("Query cancelled")]
    Cancelled,

    /// Statement exceeded its deadline
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// A driver row could not be mapped onto the result schema
    #[error("Scan failed for column {column}: {message}")]
    Scan { column: String, message: String },

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse error classes callers translate into transport responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    Validation,
    Rewrite,
    Execution,
    Scan,
    Config,
}

impl SqldError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        SqldError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Scan error for a column
    pub fn scan(column: impl Into<String>, message: impl Into<String>) -> Self {
        SqldError::Scan {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SqldError::Schema(_) | SqldError::NotRegistered(_) => ErrorKind::Schema,
            SqldError::Validation(_) | SqldError::Json(_) => ErrorKind::Validation,
            SqldError::Rewrite(_) => ErrorKind::Rewrite,
            SqldError::Postgres(_)
            | SqldError::Sqlx(_)
            | SqldError::Pool { .. }
            | SqldError::Execution(_)
            | SqldError::UnsupportedConnection(_)
            | SqldError::Cancelled
            | SqldError::Timeout(_) => ErrorKind::Execution,
            SqldError::Scan { .. } => ErrorKind::Scan,
            SqldError::Config(_) | SqldError::Io(_) | SqldError::Yaml(_) => ErrorKind::Config,
        }
    }

    /// Whether the message is safe to report verbatim to the requester.
    pub fn is_client_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::Rewrite)
    }

    /// Whether the statement was abandoned rather than rejected.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SqldError::Cancelled | SqldError::Timeout(_))
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            SqldError::Io(_) => 7,
            SqldError::Cancelled | SqldError::Timeout(_) => 5,
            _ => match self.kind() {
                ErrorKind::Schema | ErrorKind::Config => 1,
                ErrorKind::Validation | ErrorKind::Rewrite => 2,
                ErrorKind::Execution => 3,
                ErrorKind::Scan => 4,
            },
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, SqldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(SqldError::Validation("bad".into()).is_client_error());
        assert!(SqldError::Rewrite("bad".into()).is_client_error());
        assert!(!SqldError::Execution("boom".into()).is_client_error());
        assert!(!SqldError::Schema("dup".into()).is_client_error());
    }

    #[test]
    fn test_cancellation_is_execution_subcase() {
        let err = SqldError::Timeout(Duration::from_secs(3));
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.is_cancellation());
        assert!(!SqldError::Execution("x".into()).is_cancellation());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(SqldError::Config("x".into()).exit_code(), 1);
        assert_eq!(SqldError::NotRegistered("x".into()).exit_code(), 1);
        assert_eq!(SqldError::Validation("x".into()).exit_code(), 2);
        assert_eq!(SqldError::UnsupportedConnection("x".into()).exit_code(), 3);
        assert_eq!(SqldError::scan("id", "x").exit_code(), 4);
        assert_eq!(SqldError::Cancelled.exit_code(), 5);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(SqldError::from(io).exit_code(), 7);
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = SqldError::pool("timed out", "getting connection");
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Pool error: timed out"));
        assert!(detailed.contains("getting connection"));
    }
}
