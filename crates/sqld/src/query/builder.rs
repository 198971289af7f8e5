//! Structured query builder.
//!
//! [`validate`] checks a request against a record schema without producing
//! any SQL; [`build`] turns a validated request into a statement. Identifiers
//! come only from the schema. Every caller value is bound as a positional
//! argument.

use super::pagination::{resolve_window, Window};
use super::request::QueryRequest;
use super::{PlannedQuery, Statement};
use crate::core::schema::{AttributeDescriptor, RecordSchema};
use crate::core::traits::Dialect;
use crate::error::{Result, SqldError};
use crate::exec::executor::ScanPlan;

/// Validate a request and return its resolved window.
pub fn validate(request: &QueryRequest, schema: &RecordSchema) -> Result<Window> {
    if schema.location().is_none() {
        return Err(SqldError::Validation(format!(
            "record type '{}' has no storage location",
            schema.record_type()
        )));
    }

    if request.select.is_empty() {
        return Err(SqldError::Validation(
            "select must name at least one field".to_string(),
        ));
    }
    for key in &request.select {
        resolve(schema, key, "select")?;
    }

    for (key, value) in &request.filters {
        let attr = resolve(schema, key, "where")?;
        if let Err((got, want)) = attr.check_compatible(value) {
            return Err(SqldError::Validation(format!(
                "filter '{}' type mismatch: got {}, want {}",
                key, got, want
            )));
        }
    }

    for clause in &request.order_by {
        resolve(schema, &clause.field, "orderBy")?;
    }

    resolve_window(request.pagination.as_ref(), request.limit, request.offset)
}

/// Build the statement and scan plan for a validated request.
pub fn build(
    request: &QueryRequest,
    schema: &RecordSchema,
    dialect: &dyn Dialect,
    window: Window,
) -> Result<PlannedQuery> {
    let location = schema.location().ok_or_else(|| {
        SqldError::Validation(format!(
            "record type '{}' has no storage location",
            schema.record_type()
        ))
    })?;

    let mut selected = Vec::with_capacity(request.select.len());
    let mut columns = Vec::with_capacity(request.select.len());
    for key in &request.select {
        let attr = resolve(schema, key, "select")?;
        columns.push(dialect.quote_ident(&attr.storage_key)?);
        selected.push(attr.clone());
    }

    let mut sql = format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        dialect.quote_location(location)?
    );
    let mut args = Vec::new();

    let mut conditions = Vec::with_capacity(request.filters.len());
    for (key, value) in &request.filters {
        let attr = resolve(schema, key, "where")?;
        let column = dialect.quote_ident(&attr.storage_key)?;
        if value.is_null() {
            conditions.push(format!("{} IS NULL", column));
        } else {
            args.push(attr.to_native(value)?);
            conditions.push(format!(
                "{} = {}",
                column,
                dialect.param_placeholder(args.len())
            ));
        }
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    if !request.order_by.is_empty() {
        let mut clauses = Vec::with_capacity(request.order_by.len());
        for clause in &request.order_by {
            let attr = resolve(schema, &clause.field, "orderBy")?;
            let direction = if clause.desc { "DESC" } else { "ASC" };
            clauses.push(format!(
                "{} {}",
                dialect.quote_ident(&attr.storage_key)?,
                direction
            ));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&clauses.join(", "));
    }

    if let Some(limit) = window.limit {
        args.push(limit.into());
        sql.push_str(&format!(" LIMIT {}", dialect.param_placeholder(args.len())));
    }
    if let Some(offset) = window.offset {
        args.push(offset.into());
        sql.push_str(&format!(" OFFSET {}", dialect.param_placeholder(args.len())));
    }

    Ok(PlannedQuery {
        statement: Statement { sql, args },
        plan: ScanPlan::new(selected),
    })
}

/// Validate then build. Building never starts if validation fails.
pub fn prepare(
    request: &QueryRequest,
    schema: &RecordSchema,
    dialect: &dyn Dialect,
) -> Result<PlannedQuery> {
    let window = validate(request, schema)?;
    build(request, schema, dialect, window)
}

fn resolve<'a>(schema: &'a RecordSchema, key: &str, clause: &str) -> Result<&'a AttributeDescriptor> {
    schema.by_external_key(key).ok_or_else(|| {
        SqldError::Validation(format!(
            "unknown field '{}' in {} for {}",
            key,
            clause,
            schema.record_type()
        ))
    })
}
