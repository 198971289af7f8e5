//! Argument coercion shared by both PostgreSQL connection kinds.
//!
//! Both adapters prepare the statement first and bind every argument as the
//! Rust type matching the parameter type the server inferred. A NULL is bound
//! with that type too, so `{{m}}::int IS NULL OR sal >= {{m}}` works with a
//! missing parameter.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;

use crate::core::value::Value;
use crate::error::{Result, SqldError};

/// An argument in the Rust type a PostgreSQL parameter type expects.
///
/// `None` is a NULL of that type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgParam {
    Int8(Option<i64>),
    Int4(Option<i32>),
    Int2(Option<i16>),
    Float8(Option<f64>),
    Float4(Option<f32>),
    Numeric(Option<Decimal>),
    Bool(Option<bool>),
    Text(Option<String>),
    TimestampTz(Option<DateTime<Utc>>),
    Timestamp(Option<NaiveDateTime>),
    Date(Option<NaiveDate>),
    Json(Option<serde_json::Value>),
    /// NULL for a parameter type with no Rust counterpart here.
    UntypedNull,
}

impl PgParam {
    /// A NULL typed for `type_name`.
    pub(crate) fn null_for(type_name: &str) -> Self {
        match type_name.to_lowercase().as_str() {
            "int8" => PgParam::Int8(None),
            "int4" => PgParam::Int4(None),
            "int2" => PgParam::Int2(None),
            "float8" => PgParam::Float8(None),
            "float4" => PgParam::Float4(None),
            "numeric" => PgParam::Numeric(None),
            "bool" => PgParam::Bool(None),
            "text" | "varchar" | "bpchar" | "name" | "citext" => PgParam::Text(None),
            "timestamptz" => PgParam::TimestampTz(None),
            "timestamp" => PgParam::Timestamp(None),
            "date" => PgParam::Date(None),
            "json" | "jsonb" => PgParam::Json(None),
            _ => PgParam::UntypedNull,
        }
    }
}

/// Convert an argument into what the server expects for `$index`.
///
/// `type_name` is matched case-insensitively, so both tokio-postgres
/// (`int4`) and sqlx (`INT4`) names work.
pub(crate) fn coerce(index: usize, type_name: &str, value: &Value) -> Result<PgParam> {
    let ty = type_name.to_lowercase();
    let mismatch = || {
        SqldError::Execution(format!(
            "cannot bind {} argument ${} as {}",
            value.type_name(),
            index,
            ty
        ))
    };
    let out_of_range = |v: &dyn std::fmt::Display| {
        SqldError::Execution(format!(
            "argument ${} value {} is out of range for {}",
            index, v, ty
        ))
    };

    let param = match (ty.as_str(), value) {
        (name, Value::Null) => PgParam::null_for(name),
        ("int8", Value::Integer(i)) => PgParam::Int8(Some(*i)),
        ("int4", Value::Integer(i)) => {
            PgParam::Int4(Some(i32::try_from(*i).map_err(|_| out_of_range(i))?))
        }
        ("int2", Value::Integer(i)) => {
            PgParam::Int2(Some(i16::try_from(*i).map_err(|_| out_of_range(i))?))
        }
        ("float8", Value::Integer(i)) => PgParam::Float8(Some(*i as f64)),
        ("float4", Value::Integer(i)) => PgParam::Float4(Some(*i as f32)),
        ("numeric", Value::Integer(i)) => PgParam::Numeric(Some(Decimal::from(*i))),
        ("float8", Value::Float(f)) => PgParam::Float8(Some(*f)),
        ("float4", Value::Float(f)) => PgParam::Float4(Some(*f as f32)),
        ("numeric", Value::Float(f)) => {
            PgParam::Numeric(Some(Decimal::try_from(*f).map_err(|_| out_of_range(f))?))
        }
        ("bool", Value::Bool(b)) => PgParam::Bool(Some(*b)),
        ("text" | "varchar" | "bpchar" | "name" | "citext", Value::Text(s)) => {
            PgParam::Text(Some(s.clone()))
        }
        ("timestamptz", Value::Timestamp(ts)) => PgParam::TimestampTz(Some(*ts)),
        ("timestamp", Value::Timestamp(ts)) => PgParam::Timestamp(Some(ts.naive_utc())),
        ("date", Value::Timestamp(ts)) => PgParam::Date(Some(ts.date_naive())),
        _ => return Err(mismatch()),
    };
    Ok(param)
}

/// Check the argument count against what the prepared statement expects.
pub(crate) fn check_arity(expected: usize, args: &[Value]) -> Result<()> {
    if expected != args.len() {
        return Err(SqldError::Execution(format!(
            "statement expects {} arguments, got {}",
            expected,
            args.len()
        )));
    }
    Ok(())
}
