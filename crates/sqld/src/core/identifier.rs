//! Identifier validation and quoting.
//!
//! SQL identifiers (table and column names) cannot be bound as parameters, so
//! every identifier that reaches statement text is validated and quoted here.
//! Identifiers only ever come from registered schemas, never from request
//! values, but they are still checked before quoting:
//! 1. Reject suspicious input (empty, null bytes, excessive length)
//! 2. Wrap in double quotes
//! 3. Escape embedded double quotes by doubling them

use crate::error::{Result, SqldError};

/// Maximum identifier length in bytes (PostgreSQL's NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier for security issues.
///
/// # Errors
///
/// Returns `SqldError::Schema` for invalid identifiers with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SqldError::Schema("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(SqldError::Schema(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(SqldError::Schema(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// ```ignore
/// assert_eq!(quote_pg("users")?, "\"users\"");
/// assert_eq!(quote_pg("table\"name")?, "\"table\"\"name\"");
/// ```
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a storage location, which is either `table` or `schema.table`.
pub fn quote_location_pg(location: &str) -> Result<String> {
    match location.split_once('.') {
        Some((schema, table)) => Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(table)?)),
        None => quote_pg(location),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("employees").is_ok());
        assert!(validate_identifier("hire_date").is_ok());
        assert!(validate_identifier("column with spaces").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        let result = validate_identifier("");
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        let result = validate_identifier("table\0name");
        assert!(result.unwrap_err().to_string().contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_length_limit() {
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
        let result = validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1));
        assert!(result.unwrap_err().to_string().contains("maximum length"));
    }

    #[test]
    fn test_quote_pg_escapes_double_quote() {
        assert_eq!(quote_pg("users").unwrap(), "\"users\"");
        assert_eq!(quote_pg("a\"b\"c").unwrap(), "\"a\"\"b\"\"c\"");
    }

    #[test]
    fn test_quote_pg_sql_injection_safely_quoted() {
        let result = quote_pg("Robert\"; DROP TABLE Students;--").unwrap();
        assert_eq!(result, "\"Robert\"\"; DROP TABLE Students;--\"");
    }

    #[test]
    fn test_quote_location() {
        assert_eq!(quote_location_pg("employees").unwrap(), "\"employees\"");
        assert_eq!(
            quote_location_pg("hr.employees").unwrap(),
            "\"hr\".\"employees\""
        );
        assert!(quote_location_pg("hr.").is_err());
    }
}
