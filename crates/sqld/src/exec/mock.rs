//! In-memory connection for unit tests.
//!
//! Behaves like a pool with a single backend session: the statement runs in
//! a spawned task that holds the session until it finishes or is aborted
//! through the cancellation token.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::traits::{ColumnSet, Connection, RawRow};
use crate::core::value::Value;
use crate::error::{Result, SqldError};

/// Returns canned rows and records every statement it receives.
#[derive(Debug, Default)]
pub(crate) struct MockConnection {
    rows: Vec<RawRow>,
    delays: Mutex<VecDeque<Duration>>,
    failure: Option<String>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    columns: Mutex<Option<ColumnSet>>,
    session: Arc<tokio::sync::Mutex<()>>,
    cancelled: AtomicBool,
}

impl MockConnection {
    pub(crate) fn with_rows(rows: Vec<RawRow>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Make the next statement take `delay` on the server.
    pub(crate) fn delayed(self, delay: Duration) -> Self {
        self.delays.lock().unwrap().push_back(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn last_columns(&self) -> Option<ColumnSet> {
        self.columns.lock().unwrap().clone()
    }

    /// Whether a statement was aborted through its token.
    pub(crate) fn saw_cancel(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn kind(&self) -> &str {
        "mock"
    }

    async fn query(
        &self,
        cancel: &CancellationToken,
        sql: &str,
        args: &[Value],
        columns: &ColumnSet,
    ) -> Result<Vec<RawRow>> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), args.to_vec()));
        *self.columns.lock().unwrap() = Some(columns.clone());
        let delay = self.delays.lock().unwrap().pop_front();

        let session = self.session.clone().lock_owned().await;
        let abort = CancellationToken::new();
        let server = {
            let abort = abort.clone();
            tokio::spawn(async move {
                let _session = session;
                if let Some(delay) = delay {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = abort.cancelled() => {}
                    }
                }
            })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                abort.cancel();
                self.cancelled.store(true, Ordering::SeqCst);
                return Err(SqldError::Cancelled);
            }
            joined = server => {
                joined.map_err(|e| SqldError::Execution(e.to_string()))?;
            }
        }

        match &self.failure {
            Some(message) => Err(SqldError::Execution(message.clone())),
            None => Ok(self.rows.clone()),
        }
    }
}
