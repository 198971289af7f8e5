//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: SQL syntax strategy for PostgreSQL
//! - [`PgNativeConnection`]: deadpool-postgres pool over tokio-postgres
//! - [`SqlxConnection`]: sqlx `PgPool`

mod dialect;
mod generic;
mod native;
mod params;

pub use dialect::PostgresDialect;
pub use generic::SqlxConnection;
pub use native::PgNativeConnection;
