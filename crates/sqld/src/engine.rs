//! Pipeline facade tying the catalog, planners and executor together.
//!
//! Structured path: request → validate → build → execute → project.
//! Raw path: text + parameters → extract → validate and order → rewrite →
//! execute → project.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::core::catalog::Catalog;
use crate::core::schema::Record;
use crate::core::traits::{Connection, Dialect};
use crate::drivers::PostgresDialect;
use crate::error::Result;
use crate::exec::{execute, project};
use crate::query::{
    builder, ParamMap, PlannedQuery, QueryRequest, QueryResponse, RawProcessor, Row,
};

/// Entry point for both request styles.
pub struct QueryEngine {
    catalog: Arc<Catalog>,
    dialect: Arc<dyn Dialect>,
    raw: RawProcessor,
    timeout: Option<Duration>,
}

impl QueryEngine {
    /// Create an engine over a (normally sealed) catalog using the PostgreSQL dialect.
    pub fn new(catalog: Arc<Catalog>) -> Result<Self> {
        Ok(Self {
            catalog,
            dialect: Arc::new(PostgresDialect::new()),
            raw: RawProcessor::new()?,
            timeout: None,
        })
    }

    pub fn with_dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set a per-statement deadline.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Validate and build a structured request without executing it.
    pub fn plan_query(&self, record_type: &str, request: &QueryRequest) -> Result<PlannedQuery> {
        let schema = self.catalog.lookup(record_type)?;
        let planned = builder::prepare(request, &schema, self.dialect.as_ref())?;
        debug!(
            "Planned {} query ({} args): {}",
            record_type,
            planned.statement.args.len(),
            planned.statement.sql
        );
        Ok(planned)
    }

    /// Validate and rewrite a raw statement without executing it.
    pub fn plan_raw(
        &self,
        sql: &str,
        params_type: &str,
        result_type: &str,
        params: &ParamMap,
    ) -> Result<PlannedQuery> {
        let param_schema = self.catalog.lookup(params_type)?;
        let result_schema = self.catalog.lookup(result_type)?;
        let planned = self.raw.prepare(
            sql,
            params,
            &param_schema,
            &result_schema,
            self.dialect.as_ref(),
        )?;
        debug!(
            "Planned raw query ({} args): {}",
            planned.statement.args.len(),
            planned.statement.sql
        );
        Ok(planned)
    }

    /// Run a structured request.
    pub async fn query<C>(
        &self,
        cancel: &CancellationToken,
        conn: &C,
        record_type: &str,
        request: &QueryRequest,
    ) -> Result<QueryResponse>
    where
        C: Connection + ?Sized,
    {
        let planned = self.plan_query(record_type, request)?;
        let rows = self.run(cancel, conn, &planned).await?;
        Ok(QueryResponse::ok(rows))
    }

    /// Run a structured request for a [`Record`] type.
    pub async fn query_as<T, C>(
        &self,
        cancel: &CancellationToken,
        conn: &C,
        request: &QueryRequest,
    ) -> Result<QueryResponse>
    where
        T: Record,
        C: Connection + ?Sized,
    {
        self.query(cancel, conn, T::record_type(), request).await
    }

    /// Run a structured request, folding any error into the response envelope.
    ///
    /// Only client errors keep their message; everything else is logged and
    /// reported generically.
    pub async fn handle_query<C>(
        &self,
        cancel: &CancellationToken,
        conn: &C,
        record_type: &str,
        request: &QueryRequest,
    ) -> QueryResponse
    where
        C: Connection + ?Sized,
    {
        match self.query(cancel, conn, record_type, request).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_client_error() {
                    warn!("Rejected {} request: {}", record_type, e);
                } else {
                    error!("{} request failed: {}", record_type, e);
                }
                QueryResponse::from_error(&e)
            }
        }
    }

    /// Run a raw named-parameter statement.
    pub async fn raw<C>(
        &self,
        cancel: &CancellationToken,
        conn: &C,
        sql: &str,
        params_type: &str,
        result_type: &str,
        params: &ParamMap,
    ) -> Result<Vec<Row>>
    where
        C: Connection + ?Sized,
    {
        let planned = self.plan_raw(sql, params_type, result_type, params)?;
        self.run(cancel, conn, &planned).await
    }

    /// Run a raw statement with [`Record`] types for parameters and results.
    pub async fn raw_as<P, R, C>(
        &self,
        cancel: &CancellationToken,
        conn: &C,
        sql: &str,
        params: &ParamMap,
    ) -> Result<Vec<Row>>
    where
        P: Record,
        R: Record,
        C: Connection + ?Sized,
    {
        self.raw(cancel, conn, sql, P::record_type(), R::record_type(), params)
            .await
    }

    async fn run<C>(
        &self,
        cancel: &CancellationToken,
        conn: &C,
        planned: &PlannedQuery,
    ) -> Result<Vec<Row>>
    where
        C: Connection + ?Sized,
    {
        let records = execute(cancel, conn, &planned.statement, &planned.plan, self.timeout).await?;
        Ok(project(records, &planned.plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::converter::NewtypeConverter;
    use crate::core::schema::{FieldDecl, RecordDecl};
    use crate::core::traits::RawRow;
    use crate::core::value::{SemanticType, Value};
    use crate::error::SqldError;
    use crate::exec::mock::MockConnection;

    struct Employee;

    impl Record for Employee {
        fn record_type() -> &'static str {
            "employee"
        }

        fn declaration() -> RecordDecl {
            RecordDecl::new("employee")
                .table("employees")
                .field(FieldDecl::new("id", SemanticType::Custom("employee_id".into())))
                .field(FieldDecl::new("name", SemanticType::String))
                .field(FieldDecl::new("active", SemanticType::Boolean).db("is_active"))
                .field(FieldDecl::new("dept", SemanticType::String).db("department"))
        }
    }

    struct SalarySearch;

    impl Record for SalarySearch {
        fn record_type() -> &'static str {
            "salary_search"
        }

        fn declaration() -> RecordDecl {
            RecordDecl::new("salary_search")
                .field(FieldDecl::new("dept", SemanticType::String).db("d"))
                .field(FieldDecl::new("min", SemanticType::Integer).db("m"))
        }
    }

    fn engine() -> QueryEngine {
        let catalog = Catalog::new();
        catalog
            .register_converter(NewtypeConverter::new("employee_id", SemanticType::Integer).unwrap())
            .unwrap();
        catalog.register::<Employee>().unwrap();
        catalog.register::<SalarySearch>().unwrap();
        catalog.seal();
        QueryEngine::new(Arc::new(catalog)).unwrap()
    }

    fn employee_rows() -> Vec<RawRow> {
        vec![
            RawRow::new()
                .column("id", 1i64)
                .column("name", "Ada")
                .column("is_active", true),
            RawRow::new()
                .column("id", 2i64)
                .column("name", "Grace")
                .column("is_active", true),
        ]
    }

    #[tokio::test]
    async fn test_structured_request_end_to_end() {
        let engine = engine();
        let conn = MockConnection::with_rows(employee_rows());
        let request = QueryRequest::select(["id", "name"]).filter("active", true);

        let response = engine
            .query_as::<Employee, _>(&CancellationToken::new(), &conn, &request)
            .await
            .unwrap();

        let calls = conn.calls();
        assert_eq!(
            calls[0].0,
            "SELECT \"id\", \"name\" FROM \"employees\" WHERE \"is_active\" = $1"
        );
        assert_eq!(calls[0].1, vec![Value::Bool(true)]);

        assert_eq!(response.data.len(), 2);
        let keys: Vec<&String> = response.data[0].keys().collect();
        assert_eq!(keys, vec!["id", "name"]);
        assert_eq!(
            response.data[0].get("id"),
            Some(&Value::custom("employee_id", 1i64))
        );
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_raw_request_end_to_end() {
        let engine = engine();
        let conn = MockConnection::with_rows(vec![RawRow::new().column("id", 1i64)]);
        let params: ParamMap = [
            ("d".to_string(), Value::from("Eng")),
            ("m".to_string(), Value::from(50000i64)),
        ]
        .into_iter()
        .collect();

        let rows = engine
            .raw_as::<SalarySearch, Employee, _>(
                &CancellationToken::new(),
                &conn,
                "SELECT id FROM employees WHERE department = {{d}} AND salary >= {{m}}",
                &params,
            )
            .await
            .unwrap();

        let calls = conn.calls();
        assert_eq!(
            calls[0].0,
            "SELECT id FROM employees WHERE department = $1 AND salary >= $2"
        );
        assert_eq!(calls[0].1, vec![Value::from("Eng"), Value::Integer(50000)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_never_reaches_connection() {
        let engine = engine();
        let conn = MockConnection::with_rows(employee_rows());
        let err = engine
            .query(
                &CancellationToken::new(),
                &conn,
                "employee",
                &QueryRequest::select(["salary"]),
            )
            .await
            .unwrap_err();
        assert!(err.is_client_error());
        assert!(conn.calls().is_empty());

        let err = engine
            .raw(
                &CancellationToken::new(),
                &conn,
                "SELECT 1 WHERE x = {{unknown}}",
                "salary_search",
                "employee",
                &ParamMap::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no type information for parameter unknown"));
        assert!(conn.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_record_type() {
        let err = engine()
            .plan_query("payroll", &QueryRequest::select(["id"]))
            .unwrap_err();
        assert!(matches!(err, SqldError::NotRegistered(_)));
    }

    #[tokio::test]
    async fn test_handle_query_envelopes_errors() {
        let engine = engine();
        let ok = MockConnection::with_rows(employee_rows());
        let response = engine
            .handle_query(
                &CancellationToken::new(),
                &ok,
                "employee",
                &QueryRequest::select(["id", "bogus"]),
            )
            .await;
        assert!(response.data.is_empty());
        assert!(response.error.unwrap().contains("'bogus'"));

        let broken = MockConnection::failing("connection reset");
        let response = engine
            .handle_query(
                &CancellationToken::new(),
                &broken,
                "employee",
                &QueryRequest::select(["id"]),
            )
            .await;
        assert_eq!(response.error.as_deref(), Some("internal error"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_timeout() {
        let engine = engine().with_timeout(Some(Duration::from_millis(200)));
        let conn = MockConnection::with_rows(vec![]).delayed(Duration::from_secs(5));
        let err = engine
            .query(
                &CancellationToken::new(),
                &conn,
                "employee",
                &QueryRequest::select(["id"]),
            )
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }

    #[test]
    fn test_plan_query_is_pure() {
        let engine = engine();
        let request = QueryRequest::select(["name"]).page(2, 10);
        let first = engine.plan_query("employee", &request).unwrap();
        let second = engine.plan_query("employee", &request).unwrap();
        assert_eq!(first.statement, second.statement);
        assert_eq!(
            first.statement.args,
            vec![Value::Integer(10), Value::Integer(10)]
        );
    }
}
