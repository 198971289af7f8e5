//! Pagination calculator: normalizes page-based or direct bounds.

use tracing::warn;

use super::request::PaginationRequest;
use crate::error::{Result, SqldError};

/// Page size used when a page request omits one.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Largest page size honoured; larger requests are clamped.
pub const MAX_PAGE_SIZE: i64 = 100;

/// A normalized (limit, offset) pair. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Resolve the effective window.
///
/// A page request wins over direct `limit`/`offset`.
pub fn resolve_window(
    pagination: Option<&PaginationRequest>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Window> {
    if let Some(p) = pagination {
        if limit.is_some() || offset.is_some() {
            warn!("Both pagination and limit/offset supplied; using pagination");
        }

        let page = p.page.unwrap_or(1);
        if page < 1 {
            return Err(SqldError::Validation(format!(
                "page must be at least 1, got {}",
                page
            )));
        }
        let page_size = p.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size < 1 {
            return Err(SqldError::Validation(format!(
                "pageSize must be at least 1, got {}",
                page_size
            )));
        }
        let page_size = page_size.min(MAX_PAGE_SIZE);
        let offset = (page - 1).checked_mul(page_size).ok_or_else(|| {
            SqldError::Validation(format!("page {} is out of range", page))
        })?;

        return Ok(Window {
            limit: Some(page_size),
            offset: Some(offset),
        });
    }

    for (name, value) in [("limit", limit), ("offset", offset)] {
        if let Some(v) = value {
            if v < 0 {
                return Err(SqldError::Validation(format!(
                    "{} must not be negative, got {}",
                    name, v
                )));
            }
        }
    }

    Ok(Window { limit, offset })
}
