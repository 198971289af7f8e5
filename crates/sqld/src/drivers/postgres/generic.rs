//! Generic driver-based connection over a sqlx `PgPool`.
//!
//! Statements are prepared on the acquired connection first so arguments,
//! NULLs included, bind as the parameter types the server inferred. sqlx has
//! no out-of-band cancel request, so a cancelled call detaches its connection
//! from the pool and closes it rather than handing a busy session back.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Executor, Postgres, Row, Statement as _, TypeInfo, ValueRef};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::params::{check_arity, coerce, PgParam};
use crate::config::ConnectionConfig;
use crate::core::traits::{decode_wanted, ColumnSet, Connection, RawRow};
use crate::core::value::Value;
use crate::drivers::common::SslMode;
use crate::error::{Result, SqldError};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Pooled sqlx PostgreSQL connection.
pub struct SqlxConnection {
    pool: PgPool,
}

impl SqlxConnection {
    /// Connect the pool.
    pub async fn new(config: &ConnectionConfig) -> Result<Self> {
        let ssl_mode = SslMode::parse(&config.ssl_mode)?;
        if !ssl_mode.requires_tls() {
            warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
        }

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(ssl_mode.to_sqlx());

        let pool = PgPoolOptions::new()
            .max_connections(u32::try_from(config.max_connections).unwrap_or(u32::MAX))
            .connect_with(options)
            .await?;

        info!(
            "Connected to PostgreSQL via sqlx: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Connection for SqlxConnection {
    fn kind(&self) -> &str {
        "sqlx"
    }

    async fn query(
        &self,
        cancel: &CancellationToken,
        sql: &str,
        args: &[Value],
        columns: &ColumnSet,
    ) -> Result<Vec<RawRow>> {
        let mut conn = self.pool.acquire().await?;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = run(&mut conn, sql, args, columns) => Some(result),
        };

        match outcome {
            Some(result) => result,
            None => {
                warn!("Statement cancelled, closing its sqlx connection");
                drop(conn.detach());
                Err(SqldError::Cancelled)
            }
        }
    }
}

async fn run(
    conn: &mut PgConnection,
    sql: &str,
    args: &[Value],
    columns: &ColumnSet,
) -> Result<Vec<RawRow>> {
    let param_types: Vec<String> = {
        let stmt = (&mut *conn).prepare(sql).await?;
        let types = stmt.parameters().and_then(|p| p.left()).ok_or_else(|| {
            SqldError::Execution("server did not report parameter types".to_string())
        })?;
        types.iter().map(|t| t.name().to_string()).collect()
    };
    check_arity(param_types.len(), args)?;

    let mut query = sqlx::query(sql);
    for (i, (ty, value)) in param_types.iter().zip(args).enumerate() {
        query = bind_param(query, coerce(i + 1, ty, value)?);
    }

    let rows = query.fetch_all(&mut *conn).await?;
    rows.iter().map(|row| decode_row(row, columns)).collect()
}

fn bind_param(query: PgQuery<'_>, param: PgParam) -> PgQuery<'_> {
    match param {
        PgParam::Int8(v) => query.bind(v),
        PgParam::Int4(v) => query.bind(v),
        PgParam::Int2(v) => query.bind(v),
        PgParam::Float8(v) => query.bind(v),
        PgParam::Float4(v) => query.bind(v),
        PgParam::Numeric(v) => query.bind(v),
        PgParam::Bool(v) => query.bind(v),
        PgParam::Text(v) => query.bind(v),
        PgParam::TimestampTz(v) => query.bind(v),
        PgParam::Timestamp(v) => query.bind(v),
        PgParam::Date(v) => query.bind(v),
        PgParam::Json(v) => query.bind(v),
        PgParam::UntypedNull => query.bind(None::<String>),
    }
}

fn decode_row(row: &PgRow, columns: &ColumnSet) -> Result<RawRow> {
    decode_wanted(
        row.columns().iter().map(|c| c.name()),
        columns,
        |idx, name| decode_column(row, idx, name, row.columns()[idx].type_info().name()),
    )
}

fn decode_column(row: &PgRow, idx: usize, column: &str, type_name: &str) -> Result<Value> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "INT8" => Value::Integer(row.try_get::<i64, _>(idx)?),
        "INT4" => Value::Integer(row.try_get::<i32, _>(idx)?.into()),
        "INT2" => Value::Integer(row.try_get::<i16, _>(idx)?.into()),
        "FLOAT8" => Value::Float(row.try_get::<f64, _>(idx)?),
        "FLOAT4" => Value::Float(row.try_get::<f32, _>(idx)?.into()),
        "NUMERIC" => {
            let d = row.try_get::<Decimal, _>(idx)?;
            Value::Float(d.to_f64().ok_or_else(|| {
                SqldError::scan(column, format!("numeric {} does not fit a float", d))
            })?)
        }
        "BOOL" => Value::Bool(row.try_get::<bool, _>(idx)?),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
            Value::Text(row.try_get::<String, _>(idx)?)
        }
        "JSON" | "JSONB" => Value::Text(row.try_get::<serde_json::Value, _>(idx)?.to_string()),
        "TIMESTAMPTZ" => Value::Timestamp(row.try_get::<DateTime<Utc>, _>(idx)?),
        "TIMESTAMP" => Value::Timestamp(row.try_get::<NaiveDateTime, _>(idx)?.and_utc()),
        "DATE" => Value::Timestamp(
            row.try_get::<NaiveDate, _>(idx)?
                .and_time(NaiveTime::MIN)
                .and_utc(),
        ),
        other => {
            return Err(SqldError::scan(
                column,
                format!("unsupported column type {}", other),
            ))
        }
    };
    Ok(value)
}
