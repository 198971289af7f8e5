//! Execution adapter: runs a statement on a [`Connection`] and scans the rows.
//!
//! Drivers hand back native values keyed by column name. Scanning maps them
//! onto the attributes of a [`ScanPlan`], applying converters and checking
//! nullability and types, so every driver shares one set of rules.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::schema::AttributeDescriptor;
use crate::core::traits::{ColumnSet, Connection, RawRow};
use crate::core::value::{SemanticType, Value};
use crate::error::{Result, SqldError};
use crate::query::Statement;

/// Ordered result columns rows are scanned through.
#[derive(Debug, Clone, Default)]
pub struct ScanPlan {
    columns: Vec<AttributeDescriptor>,
}

impl ScanPlan {
    pub fn new(columns: Vec<AttributeDescriptor>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[AttributeDescriptor] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Storage keys the driver has to decode.
    pub fn column_set(&self) -> ColumnSet {
        ColumnSet::only(self.columns.iter().map(|c| c.storage_key.clone()))
    }
}

/// One scanned row, positionally aligned with its [`ScanPlan`].
///
/// A slot is `None` when the driver row did not carry that column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedRecord {
    values: Vec<Option<Value>>,
}

impl TypedRecord {
    pub fn new(values: Vec<Option<Value>>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Option<Value>> {
        self.values
    }
}

/// Execute a statement and scan every row through `plan`.
///
/// The token is handed to the driver, which aborts the statement on the
/// server when it fires. A cancelled token yields [`SqldError::Cancelled`];
/// an elapsed `timeout` cancels the driver call the same way and yields
/// [`SqldError::Timeout`].
pub async fn execute<C>(
    cancel: &CancellationToken,
    conn: &C,
    statement: &Statement,
    plan: &ScanPlan,
    timeout: Option<Duration>,
) -> Result<Vec<TypedRecord>>
where
    C: Connection + ?Sized,
{
    if cancel.is_cancelled() {
        return Err(SqldError::Cancelled);
    }

    debug!(
        "Executing on {} connection ({} args): {}",
        conn.kind(),
        statement.args.len(),
        statement.sql
    );

    let call = cancel.child_token();
    let columns = plan.column_set();
    let query = conn.query(&call, &statement.sql, &statement.args, &columns);
    tokio::pin!(query);

    let rows = match timeout {
        None => query.await?,
        Some(limit) => {
            let outcome = tokio::time::timeout(limit, query.as_mut()).await;
            match outcome {
                Ok(rows) => rows?,
                Err(_) => {
                    call.cancel();
                    // The driver still has to abort the statement server side.
                    let _ = query.await;
                    return Err(SqldError::Timeout(limit));
                }
            }
        }
    };

    debug!("Scanning {} rows", rows.len());
    rows.iter().map(|row| scan_row(row, plan)).collect()
}

/// Map one driver row onto the plan.
pub fn scan_row(row: &RawRow, plan: &ScanPlan) -> Result<TypedRecord> {
    let mut values = Vec::with_capacity(plan.len());
    for attr in plan.columns() {
        let value = match row.get(&attr.storage_key) {
            Some(raw) => Some(scan_value(attr, raw.clone())?),
            None => None,
        };
        values.push(value);
    }
    Ok(TypedRecord::new(values))
}

fn scan_value(attr: &AttributeDescriptor, raw: Value) -> Result<Value> {
    if raw.is_null() {
        if attr.nullable || attr.semantic_type == SemanticType::Any {
            return Ok(Value::Null);
        }
        return Err(SqldError::scan(
            &attr.storage_key,
            format!("NULL for non-nullable {}", attr.semantic_type),
        ));
    }

    if let Some(conv) = &attr.converter {
        return conv
            .from_raw(raw)
            .map_err(|e| SqldError::scan(&attr.storage_key, e.to_string()));
    }

    match raw.semantic_type() {
        _ if attr.semantic_type == SemanticType::Any => Ok(raw),
        Some(actual) if actual == attr.semantic_type => Ok(raw),
        _ => Err(SqldError::scan(
            &attr.storage_key,
            format!("got {}, want {}", raw.type_name(), attr.semantic_type),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::converter::{Converter, NewtypeConverter};
    use crate::core::schema::{FieldDecl, RecordDecl, RecordSchema};
    use crate::exec::mock::MockConnection;

    fn plan() -> ScanPlan {
        let conv: Arc<dyn Converter> =
            Arc::new(NewtypeConverter::new("employee_id", SemanticType::Integer).unwrap());
        let decl = RecordDecl::new("employee")
            .field(FieldDecl::new("id", SemanticType::Custom("employee_id".into())))
            .field(FieldDecl::new("name", SemanticType::String))
            .field(FieldDecl::new("manager", SemanticType::Integer).db("manager_id").nullable());
        let schema = RecordSchema::build(&decl, |_| Some(conv.clone())).unwrap();
        ScanPlan::new(schema.attributes().to_vec())
    }

    fn statement() -> Statement {
        Statement {
            sql: "SELECT id, name, manager_id FROM employees".to_string(),
            args: vec![],
        }
    }

    #[test]
    fn test_scan_applies_converter_and_nulls() {
        let row = RawRow::new()
            .column("id", 7i64)
            .column("name", "Ada")
            .column("manager_id", Value::Null)
            .column("extra", true);
        let record = scan_row(&row, &plan()).unwrap();
        assert_eq!(
            record.values(),
            &[
                Some(Value::custom("employee_id", 7i64)),
                Some(Value::Text("Ada".into())),
                Some(Value::Null)
            ]
        );
    }

    #[test]
    fn test_missing_columns_stay_unpopulated() {
        let row = RawRow::new().column("name", "Ada");
        let record = scan_row(&row, &plan()).unwrap();
        assert_eq!(record.get(0), None);
        assert_eq!(record.get(1), Some(&Value::Text("Ada".into())));
    }

    #[test]
    fn test_scan_errors() {
        let null_name = RawRow::new().column("name", Value::Null);
        let err = scan_row(&null_name, &plan()).unwrap_err();
        assert!(matches!(err, SqldError::Scan { ref column, .. } if column == "name"));

        let wrong_type = RawRow::new().column("name", 3i64);
        assert!(scan_row(&wrong_type, &plan()).is_err());

        let rejected = RawRow::new().column("id", "seven");
        let err = scan_row(&rejected, &plan()).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[tokio::test]
    async fn test_execute_passes_statement_through() {
        let conn = MockConnection::with_rows(vec![
            RawRow::new().column("id", 1i64).column("name", "Ada"),
            RawRow::new().column("id", 2i64).column("name", "Grace"),
        ]);
        let stmt = Statement {
            sql: "SELECT id, name FROM employees WHERE name = $1".to_string(),
            args: vec![Value::from("Ada")],
        };
        let records = execute(&CancellationToken::new(), &conn, &stmt, &plan(), None)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get(1), Some(&Value::Text("Grace".into())));
        assert_eq!(conn.calls(), vec![(stmt.sql.clone(), stmt.args.clone())]);
        assert_eq!(
            conn.last_columns(),
            Some(ColumnSet::only(["id", "name", "manager_id"]))
        );
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_skips_driver() {
        let conn = MockConnection::with_rows(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = execute(&cancel, &conn, &statement(), &plan(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SqldError::Cancelled));
        assert!(conn.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_query() {
        let conn = MockConnection::with_rows(vec![]).delayed(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let err = execute(&cancel, &conn, &statement(), &plan(), None)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
        assert!(conn.saw_cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_statement_does_not_block_the_next_one() {
        let conn = MockConnection::with_rows(vec![RawRow::new().column("name", "Ada")])
            .delayed(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let err = execute(&cancel, &conn, &statement(), &plan(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SqldError::Cancelled));

        let started = tokio::time::Instant::now();
        let records = execute(&CancellationToken::new(), &conn, &statement(), &plan(), None)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses() {
        let conn = MockConnection::with_rows(vec![]).delayed(Duration::from_secs(60));
        let err = execute(
            &CancellationToken::new(),
            &conn,
            &statement(),
            &plan(),
            Some(Duration::from_secs(5)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SqldError::Timeout(d) if d == Duration::from_secs(5)));
        assert!(conn.saw_cancel());
    }

    #[tokio::test]
    async fn test_driver_error_propagates() {
        let conn = MockConnection::failing("relation \"employees\" does not exist");
        let err = execute(&CancellationToken::new(), &conn, &statement(), &plan(), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert!(!err.is_client_error());
    }
}
