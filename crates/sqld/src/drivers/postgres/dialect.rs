//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Provides PostgreSQL-specific identifier quoting and parameter placeholders.

use crate::core::identifier::{quote_location_pg, quote_pg};
use crate::core::traits::Dialect;
use crate::error::Result;

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_pg(name)
    }

    fn quote_location(&self, location: &str) -> Result<String> {
        quote_location_pg(location)
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote_ident("users").unwrap(), "\"users\"");
        assert_eq!(dialect.quote_ident("user\"name").unwrap(), "\"user\"\"name\"");
        assert!(dialect.quote_ident("").is_err());
    }

    #[test]
    fn test_quote_location() {
        let dialect = PostgresDialect::new();
        assert_eq!(
            dialect.quote_location("public.users").unwrap(),
            "\"public\".\"users\""
        );
    }

    #[test]
    fn test_param_placeholder() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.param_placeholder(1), "$1");
        assert_eq!(dialect.param_placeholder(10), "$10");
    }
}
