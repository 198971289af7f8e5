//! Statement execution and result projection.

pub mod executor;
#[cfg(test)]
pub(crate) mod mock;
pub mod projector;

pub use executor::{execute, scan_row, ScanPlan, TypedRecord};
pub use projector::project;
