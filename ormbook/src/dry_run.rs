//! An executor that records SQL instead of running it.
//!
//! The CLI's `sql` command runs a pattern against a [`DryRun`] to show the
//! statements it would issue. Queries come back empty, so patterns that need
//! a row to continue stop after their first statement.

use ormbook_core::{OrmError, OrmResult, Settings};
use ormbook_db::query::compiler::{DatabaseBackendType, Row};
use ormbook_db::value::Value;
use ormbook_db::DbExecutor;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::catalog;

/// One statement a pattern issued.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedStatement {
    pub sql: String,
    pub params: Vec<serde_json::Value>,
}

/// Records every statement and returns empty results.
#[derive(Debug, Default)]
pub struct DryRun {
    statements: Mutex<Vec<RecordedStatement>>,
}

impl DryRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// The statements recorded so far, in order.
    pub async fn statements(&self) -> Vec<RecordedStatement> {
        self.statements.lock().await.clone()
    }

    async fn record(&self, sql: &str, params: &[Value]) {
        self.statements.lock().await.push(RecordedStatement {
            sql: sql.to_string(),
            params: params.iter().map(Value::to_json).collect(),
        });
    }
}

#[async_trait::async_trait]
impl DbExecutor for DryRun {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        self.record(sql, params).await;
        Ok(0)
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        self.record(sql, params).await;
        Ok(Vec::new())
    }

    async fn query_one(&self, sql: &str, params: &[Value]) -> OrmResult<Row> {
        self.record(sql, params).await;
        Err(OrmError::DoesNotExist("dry run returns no rows".to_string()))
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> OrmResult<Value> {
        self.record(sql, params).await;
        Ok(Value::Int(0))
    }
}

/// Runs pattern `number` without a database and returns the SQL it issued.
///
/// Errors caused by the empty results are expected and only logged; an
/// unknown pattern number is still an error.
pub async fn capture_sql(number: u8, settings: &Settings) -> OrmResult<Vec<RecordedStatement>> {
    let recorder = DryRun::new();
    match catalog::run(number, &recorder, settings).await {
        Ok(_) => {}
        Err(e @ OrmError::ConfigurationError(_)) => return Err(e),
        Err(e) => tracing::debug!(error = %e, "dry run stopped early"),
    }
    Ok(recorder.statements().await)
}
