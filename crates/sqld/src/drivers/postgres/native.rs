//! Native PostgreSQL connection: a deadpool pool over tokio-postgres.
//!
//! Statements are prepared first so arguments can be bound with the parameter
//! types the server inferred; result columns are decoded by their reported
//! type name. A cancelled call sends a cancel request for the session's
//! backend before the connection goes back to the pool.

use std::error::Error as StdError;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use deadpool_postgres::{Client, Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::{CancelToken, Config as PgConfig, NoTls};
use tokio_postgres_rustls::MakeRustlsConnect;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::params::{check_arity, coerce, PgParam};
use crate::config::ConnectionConfig;
use crate::core::traits::{decode_wanted, ColumnSet, Connection, RawRow};
use crate::core::value::Value;
use crate::drivers::common::{SslMode, TlsBuilder};
use crate::error::{Result, SqldError};

type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// Pooled native PostgreSQL connection.
pub struct PgNativeConnection {
    pool: Pool,
    /// Connector for out-of-band cancel requests; `None` means plaintext.
    tls: Option<MakeRustlsConnect>,
}

impl PgNativeConnection {
    /// Create the pool and test one connection.
    pub async fn new(config: &ConnectionConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let ssl_mode = SslMode::parse(&config.ssl_mode)?;
        let tls = TlsBuilder::new(ssl_mode).build()?;
        let pool = match &tls {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(config.max_connections)
                    .build()
                    .map_err(|e| SqldError::pool(e, "creating PostgreSQL pool"))?
            }
            Some(tls_connector) => {
                let mgr = Manager::from_config(pg_config, tls_connector.clone(), mgr_config);
                Pool::builder(mgr)
                    .max_size(config.max_connections)
                    .build()
                    .map_err(|e| SqldError::pool(e, "creating PostgreSQL pool"))?
            }
        };

        let client = pool
            .get()
            .await
            .map_err(|e| SqldError::pool(e, "testing PostgreSQL connection"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self { pool, tls })
    }

    /// Wrap an existing pool. `tls` must match the pool's connector.
    pub fn from_pool(pool: Pool, tls: Option<MakeRustlsConnect>) -> Self {
        Self { pool, tls }
    }

    /// Ask the server to abort whatever the session behind `token` runs.
    async fn cancel_on_server(&self, token: &CancelToken) -> Result<()> {
        match &self.tls {
            Some(tls) => token.cancel_query(tls.clone()).await?,
            None => token.cancel_query(NoTls).await?,
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for PgNativeConnection {
    fn kind(&self) -> &str {
        "native"
    }

    async fn query(
        &self,
        cancel: &CancellationToken,
        sql: &str,
        args: &[Value],
        columns: &ColumnSet,
    ) -> Result<Vec<RawRow>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| SqldError::pool(e, "getting PostgreSQL connection"))?;
        let server_cancel = client.cancel_token();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = run(&client, sql, args, columns) => Some(result),
        };

        match outcome {
            Some(result) => result,
            None => {
                match self.cancel_on_server(&server_cancel).await {
                    Ok(()) => debug!("Cancel request sent for in-flight statement"),
                    Err(e) => {
                        warn!("Cancel request failed, discarding connection: {}", e);
                        drop(Object::take(client));
                    }
                }
                Err(SqldError::Cancelled)
            }
        }
    }
}

async fn run(client: &Client, sql: &str, args: &[Value], columns: &ColumnSet) -> Result<Vec<RawRow>> {
    let stmt = client.prepare(sql).await?;
    let param_types = stmt.params();
    check_arity(param_types.len(), args)?;

    let bound = param_types
        .iter()
        .zip(args)
        .enumerate()
        .map(|(i, (ty, value))| coerce(i + 1, ty.name(), value).map(to_sql_param))
        .collect::<Result<Vec<BoxedParam>>>()?;
    let refs: Vec<&(dyn ToSql + Sync)> = bound
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect();

    let rows = client.query(&stmt, &refs).await?;
    rows.iter().map(|row| decode_row(row, columns)).collect()
}

fn to_sql_param(param: PgParam) -> BoxedParam {
    match param {
        PgParam::Int8(v) => Box::new(v),
        PgParam::Int4(v) => Box::new(v),
        PgParam::Int2(v) => Box::new(v),
        PgParam::Float8(v) => Box::new(v),
        PgParam::Float4(v) => Box::new(v),
        PgParam::Numeric(v) => Box::new(v),
        PgParam::Bool(v) => Box::new(v),
        PgParam::Text(v) => Box::new(v),
        PgParam::TimestampTz(v) => Box::new(v),
        PgParam::Timestamp(v) => Box::new(v),
        PgParam::Date(v) => Box::new(v),
        PgParam::Json(v) => Box::new(v),
        PgParam::UntypedNull => Box::new(AnyNull),
    }
}

/// NULL accepted for any parameter type.
#[derive(Debug)]
struct AnyNull;

impl ToSql for AnyNull {
    fn to_sql(
        &self,
        _ty: &Type,
        _out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
        Ok(IsNull::Yes)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn decode_row(row: &tokio_postgres::Row, columns: &ColumnSet) -> Result<RawRow> {
    decode_wanted(
        row.columns().iter().map(|c| c.name()),
        columns,
        |idx, name| decode_column(row, idx, name, row.columns()[idx].type_()),
    )
}

fn decode_column(row: &tokio_postgres::Row, idx: usize, column: &str, ty: &Type) -> Result<Value> {
    let value = match ty.name() {
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(Value::Integer),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| Value::Integer(v.into())),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| Value::Integer(v.into())),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(Value::Float),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| Value::Float(v.into())),
        "numeric" => match row.try_get::<_, Option<Decimal>>(idx)? {
            Some(d) => Some(Value::Float(d.to_f64().ok_or_else(|| {
                SqldError::scan(column, format!("numeric {} does not fit a float", d))
            })?)),
            None => None,
        },
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
        "text" | "varchar" | "bpchar" | "name" | "citext" => {
            row.try_get::<_, Option<String>>(idx)?.map(Value::Text)
        }
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(|v| Value::Text(v.to_string())),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(Value::Timestamp),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|v| Value::Timestamp(v.and_utc())),
        "date" => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|v| Value::Timestamp(v.and_time(NaiveTime::MIN).and_utc())),
        other => {
            return Err(SqldError::scan(
                column,
                format!("unsupported column type {}", other),
            ))
        }
    };
    Ok(value.unwrap_or(Value::Null))
}
