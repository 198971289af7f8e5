//! Turning requests into parameterized statements.
//!
//! - [`request`]: wire types for the structured path
//! - [`pagination`]: window normalization
//! - [`builder`]: structured request → statement
//! - [`raw`]: `{{name}}` statement → positional statement

pub mod builder;
pub mod pagination;
pub mod raw;
pub mod request;

use serde::Serialize;

use crate::core::value::Value;
use crate::exec::executor::ScanPlan;

pub use builder::{build, prepare, validate};
pub use pagination::{resolve_window, Window};
pub use raw::RawProcessor;
pub use request::{OrderBy, PaginationRequest, ParamMap, QueryRequest, QueryResponse, Row};

/// Statement text with positional markers plus its ordered, driver-native arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

/// A statement together with the plan its rows are scanned through.
#[derive(Debug, Clone)]
pub struct PlannedQuery {
    pub statement: Statement,
    pub plan: ScanPlan,
}
