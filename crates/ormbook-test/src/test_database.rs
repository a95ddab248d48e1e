//! Test database utilities for ormbook.
//!
//! Provides [`TestDatabase`], an in-memory SQLite database wrapper for use in
//! tests. It implements [`DbExecutor`] so it can be used with all ORM
//! operations, creates tables from model metadata, and records every
//! statement it executes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ormbook_test::test_database::TestDatabase;
//!
//! async fn example() {
//!     let db = TestDatabase::new().unwrap();
//!     db.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
//!         .await
//!         .unwrap();
//!     assert_eq!(db.query_count(), 1);
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use ormbook_core::OrmResult;
use ormbook_db::model::ModelMeta;
use ormbook_db::query::compiler::{DatabaseBackendType, Row};
use ormbook_db::value::Value;
use ormbook_db::{DbExecutor, SchemaEditor};
use ormbook_db_backends::sqlite::SqliteBackend;

/// An in-memory SQLite database for testing.
///
/// Wraps a [`SqliteBackend`] and records the SQL of every statement for use
/// with [`assert_num_queries`](crate::assert_num_queries) and
/// [`captured_sql`](Self::captured_sql).
///
/// Each `TestDatabase::new()` call creates a fresh database, so tests are
/// fully isolated. Clones share the database and the log.
#[derive(Clone)]
pub struct TestDatabase {
    backend: Arc<SqliteBackend>,
    log: Arc<Mutex<Vec<String>>>,
}

impl std::fmt::Debug for TestDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestDatabase")
            .field("query_count", &self.query_count())
            .finish_non_exhaustive()
    }
}

impl TestDatabase {
    /// Creates a new in-memory SQLite test database.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn new() -> OrmResult<Self> {
        Ok(Self {
            backend: Arc::new(SqliteBackend::memory()?),
            log: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Creates a test database with a table for each model, in order.
    ///
    /// The statements that create the tables are not left in the log.
    pub async fn with_models(metas: &[&ModelMeta]) -> OrmResult<Self> {
        let db = Self::new()?;
        SchemaEditor::new(DatabaseBackendType::SQLite)
            .create_tables(&db, metas)
            .await?;
        db.reset_query_count();
        Ok(db)
    }

    /// Creates the table for a single model.
    pub async fn setup_table(&self, meta: &ModelMeta) -> OrmResult<()> {
        SchemaEditor::new(DatabaseBackendType::SQLite)
            .create_tables(self, &[meta])
            .await
    }

    /// Drops all user-created tables in the database.
    pub async fn teardown(&self) -> OrmResult<()> {
        // Child tables reference parents; switch enforcement off while dropping.
        self.backend.execute_sql("PRAGMA foreign_keys=OFF", &[]).await?;
        let rows = self
            .backend
            .query(
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
                &[],
            )
            .await?;

        for row in &rows {
            let table_name: String = row.get("name")?;
            self.backend
                .execute_sql(&format!("DROP TABLE IF EXISTS \"{table_name}\""), &[])
                .await?;
        }
        self.backend.execute_sql("PRAGMA foreign_keys=ON", &[]).await?;
        Ok(())
    }

    /// Executes a raw SQL string with no parameters.
    pub async fn execute_raw(&self, sql: &str) -> OrmResult<u64> {
        self.record(sql);
        self.backend.execute_sql(sql, &[]).await
    }

    /// Returns the number of statements executed since the last reset.
    pub fn query_count(&self) -> usize {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns the SQL of every statement executed since the last reset.
    pub fn captured_sql(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Clears the statement log.
    pub fn reset_query_count(&self) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Returns a reference to the inner `SqliteBackend`.
    pub fn backend(&self) -> &SqliteBackend {
        &self.backend
    }

    fn record(&self, sql: &str) {
        record(&self.log, sql);
    }
}

fn record(log: &Mutex<Vec<String>>, sql: &str) {
    log.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(sql.to_string());
}

/// A reserved connection whose statements still land in the test log.
struct LoggedConnection {
    inner: Box<dyn DbExecutor>,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl DbExecutor for LoggedConnection {
    fn backend_type(&self) -> DatabaseBackendType {
        self.inner.backend_type()
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        record(&self.log, sql);
        self.inner.execute_sql(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        record(&self.log, sql);
        self.inner.query(sql, params).await
    }

    async fn query_one(&self, sql: &str, params: &[Value]) -> OrmResult<Row> {
        record(&self.log, sql);
        self.inner.query_one(sql, params).await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> OrmResult<Value> {
        record(&self.log, sql);
        self.inner.insert_returning_id(sql, params).await
    }
}

#[async_trait::async_trait]
impl DbExecutor for TestDatabase {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        self.record(sql);
        self.backend.execute_sql(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        self.record(sql);
        DbExecutor::query(&*self.backend, sql, params).await
    }

    async fn query_one(&self, sql: &str, params: &[Value]) -> OrmResult<Row> {
        self.record(sql);
        DbExecutor::query_one(&*self.backend, sql, params).await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> OrmResult<Value> {
        self.record(sql);
        self.backend.insert_returning_id(sql, params).await
    }

    async fn reserve(&self) -> OrmResult<Option<Box<dyn DbExecutor>>> {
        let Some(inner) = DbExecutor::reserve(&*self.backend).await? else {
            return Ok(None);
        };
        Ok(Some(Box::new(LoggedConnection {
            inner,
            log: Arc::clone(&self.log),
        })))
    }
}
