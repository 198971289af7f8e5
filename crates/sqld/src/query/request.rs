//! Request and response wire types for the structured path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::value::Value;
use crate::error::SqldError;

/// A projected result row keyed by external key.
pub type Row = BTreeMap<String, Value>;

/// Named parameters for a raw statement.
pub type ParamMap = BTreeMap<String, Value>;

/// A structured data request.
///
/// Filters are held in a sorted map so bind order is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// External keys to return, in order.
    #[serde(default)]
    pub select: Vec<String>,

    /// Equality filters: external key to value.
    #[serde(default, rename = "where")]
    pub filters: BTreeMap<String, Value>,

    #[serde(default)]
    pub order_by: Vec<OrderBy>,

    #[serde(default)]
    pub pagination: Option<PaginationRequest>,

    #[serde(default)]
    pub limit: Option<i64>,

    #[serde(default)]
    pub offset: Option<i64>,
}

impl QueryRequest {
    pub fn select<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            select: fields.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, desc: bool) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            desc,
        });
        self
    }

    pub fn page(mut self, page: i64, page_size: i64) -> Self {
        self.pagination = Some(PaginationRequest {
            page: Some(page),
            page_size: Some(page_size),
        });
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// One sort clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub desc: bool,
}

/// Page-based window request. Missing values take their defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationRequest {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

/// Generic response envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    pub fn ok(data: Vec<Row>) -> Self {
        Self { data, error: None }
    }

    /// Build an error response. Only client errors keep their message.
    pub fn from_error(err: &SqldError) -> Self {
        let message = if err.is_client_error() {
            err.to_string()
        } else {
            "internal error".to_string()
        };
        Self {
            data: Vec::new(),
            error: Some(message),
        }
    }
}
