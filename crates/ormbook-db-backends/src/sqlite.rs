//! SQLite database backend using `rusqlite`.
//!
//! This module provides the [`SqliteBackend`] which implements the
//! [`DatabaseBackend`](crate::base::DatabaseBackend) trait and the ORM's
//! [`DbExecutor`] using `rusqlite` wrapped in `tokio::task::spawn_blocking`.
//!
//! Features:
//! - Foreign key enforcement switched on for every connection
//! - WAL mode for file-based databases
//! - In-memory database support via `:memory:` path (great for testing)
//! - Simple `Mutex`-based concurrency control, with
//!   [`ReservedConnection`] giving a transaction the connection to itself

use crate::base::{DatabaseBackend, DatabaseConfig};
use ormbook_core::{OrmError, OrmResult};
use ormbook_db::query::compiler::DatabaseBackendType;
use ormbook_db::value::Value;
use ormbook_db::{DbExecutor, Row};
use std::borrow::Borrow;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A SQLite database backend.
///
/// Uses `rusqlite` for database access with a `Mutex`-based concurrency
/// model. All operations are run via `tokio::task::spawn_blocking` to
/// avoid blocking the async runtime.
pub struct SqliteBackend {
    /// The path to the database file (or ":memory:").
    path: PathBuf,
    /// The connection, guarded by an async mutex.
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Opens a SQLite database at the given path.
    ///
    /// If the path is `:memory:`, an in-memory database is created.
    /// Foreign keys are always enforced; file databases also use WAL.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::OperationalError`] if the database cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> OrmResult<Self> {
        let path = path.into();
        let in_memory = path.to_str() == Some(":memory:");
        let conn = if in_memory {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| OrmError::OperationalError(format!("SQLite open failed: {e}")))?;

        let pragmas = if in_memory {
            "PRAGMA foreign_keys=ON;"
        } else {
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;"
        };
        conn.execute_batch(pragmas)
            .map_err(|e| OrmError::OperationalError(format!("Failed to set pragmas: {e}")))?;

        tracing::debug!(path = %path.display(), "sqlite database opened");
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database (convenience constructor).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn memory() -> OrmResult<Self> {
        Self::open(":memory:")
    }

    /// Opens the database a [`DatabaseConfig`] describes.
    pub fn from_config(config: &DatabaseConfig) -> OrmResult<Self> {
        if config.backend != DatabaseBackendType::SQLite {
            return Err(OrmError::ImproperlyConfigured(format!(
                "SqliteBackend cannot open a {:?} configuration",
                config.backend
            )));
        }
        Self::open(&config.name)
    }

    /// Returns the database file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Binds ORM `Value` types to a `rusqlite` statement.
    fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> OrmResult<()> {
        for (i, param) in params.iter().enumerate() {
            let idx = i + 1;
            match param {
                Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
                Value::Bool(b) => stmt.raw_bind_parameter(idx, b),
                Value::Int(v) => stmt.raw_bind_parameter(idx, v),
                Value::Float(v) => stmt.raw_bind_parameter(idx, v),
                Value::String(s) => stmt.raw_bind_parameter(idx, s.as_str()),
                Value::Bytes(b) => stmt.raw_bind_parameter(idx, b.as_slice()),
                Value::Date(d) => stmt.raw_bind_parameter(idx, d.to_string().as_str()),
                Value::DateTime(dt) => stmt.raw_bind_parameter(idx, dt.to_string().as_str()),
                Value::Json(j) => stmt.raw_bind_parameter(idx, j.to_string().as_str()),
                Value::List(_) => {
                    stmt.raw_bind_parameter(idx, param.to_json().to_string().as_str())
                }
            }
            .map_err(|e| OrmError::DatabaseError(format!("Bind error: {e}")))?;
        }
        Ok(())
    }

    /// Converts a `rusqlite::Row` to our generic `Row`.
    fn convert_row(sqlite_row: &rusqlite::Row<'_>, column_names: &[String]) -> OrmResult<Row> {
        let mut values = Vec::with_capacity(column_names.len());
        for i in 0..column_names.len() {
            let value = match sqlite_row.get_ref(i).map_err(map_sqlite_error)? {
                rusqlite::types::ValueRef::Null => Value::Null,
                rusqlite::types::ValueRef::Integer(v) => Value::Int(v),
                rusqlite::types::ValueRef::Real(v) => Value::Float(v),
                rusqlite::types::ValueRef::Text(b) => {
                    Value::String(String::from_utf8_lossy(b).to_string())
                }
                rusqlite::types::ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
            };
            values.push(value);
        }
        Ok(Row::new(column_names.to_vec(), values))
    }

    /// Prepares, binds and runs a statement on a locked connection.
    fn execute_locked(conn: &rusqlite::Connection, sql: &str, params: &[Value]) -> OrmResult<u64> {
        let mut stmt = conn.prepare(sql).map_err(map_sqlite_error)?;
        Self::bind_params(&mut stmt, params)?;
        let count = stmt.raw_execute().map_err(map_sqlite_error)?;
        Ok(count as u64)
    }

    fn query_locked(
        conn: &rusqlite::Connection,
        sql: &str,
        params: &[Value],
    ) -> OrmResult<Vec<Row>> {
        let mut stmt = conn.prepare(sql).map_err(map_sqlite_error)?;

        let column_names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        Self::bind_params(&mut stmt, params)?;

        let mut raw_rows = stmt.raw_query();
        let mut rows = Vec::new();
        while let Some(row) = raw_rows.next().map_err(map_sqlite_error)? {
            rows.push(Self::convert_row(row, &column_names)?);
        }

        Ok(rows)
    }

    // INSERT and last_insert_rowid() run under one lock so no other
    // statement can slip in between.
    fn insert_locked(conn: &rusqlite::Connection, sql: &str, params: &[Value]) -> OrmResult<Value> {
        Self::execute_locked(conn, sql, params)?;
        Ok(Value::Int(conn.last_insert_rowid()))
    }

    /// Takes the connection for the caller alone.
    ///
    /// Waits for statements and reservations already in flight. Until the
    /// returned [`ReservedConnection`] is dropped, every other statement on
    /// this backend waits, so a transaction run on it cannot interleave
    /// with other tasks.
    pub async fn reserve_connection(&self) -> OrmResult<ReservedConnection> {
        let guard = Arc::clone(&self.conn).lock_owned().await;
        tracing::debug!(path = %self.path.display(), "connection reserved");
        Ok(ReservedConnection {
            conn: Arc::new(Mutex::new(Held(guard))),
        })
    }
}

/// Maps a driver error onto the ORM's error categories.
///
/// Constraint violations (UNIQUE, FOREIGN KEY, NOT NULL, CHECK) become
/// [`OrmError::IntegrityError`]; everything else is a
/// [`OrmError::DatabaseError`].
fn map_sqlite_error(e: rusqlite::Error) -> OrmError {
    if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
        OrmError::IntegrityError(e.to_string())
    } else {
        OrmError::DatabaseError(e.to_string())
    }
}

fn join_error(e: tokio::task::JoinError) -> OrmError {
    OrmError::DatabaseError(format!("Task join error: {e}"))
}

/// Runs `f` on a blocking thread with the connection behind `conn` locked.
async fn blocking<C, T, F>(conn: &Arc<Mutex<C>>, f: F) -> OrmResult<T>
where
    C: Borrow<rusqlite::Connection> + Send + 'static,
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> OrmResult<T> + Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let guard = conn.blocking_lock();
        f(Borrow::<rusqlite::Connection>::borrow(&*guard))
    })
    .await
    .map_err(join_error)?
}

/// The backend's connection, held for as long as a reservation lives.
struct Held(OwnedMutexGuard<rusqlite::Connection>);

impl Borrow<rusqlite::Connection> for Held {
    fn borrow(&self) -> &rusqlite::Connection {
        &self.0
    }
}

impl Drop for Held {
    fn drop(&mut self) {
        // A transaction abandoned mid-way must not leak into the next user.
        if !self.0.is_autocommit() {
            tracing::warn!("reserved connection released inside a transaction; rolling back");
            if let Err(e) = self.0.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "rollback failed");
            }
        }
    }
}

/// Exclusive use of a [`SqliteBackend`]'s connection.
///
/// Obtained from [`SqliteBackend::reserve_connection`] or through
/// [`DbExecutor::reserve`]. Dropping it hands the connection back; a
/// transaction still open at that point is rolled back.
pub struct ReservedConnection {
    conn: Arc<Mutex<Held>>,
}

impl std::fmt::Debug for ReservedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservedConnection").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl DatabaseBackend for SqliteBackend {
    fn vendor(&self) -> &str {
        "sqlite"
    }

    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        tracing::debug!(sql, params = params.len(), "execute");
        let (sql, params) = (sql.to_string(), params.to_vec());
        blocking(&self.conn, move |conn| Self::execute_locked(conn, &sql, &params)).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        tracing::debug!(sql, params = params.len(), "query");
        let (sql, params) = (sql.to_string(), params.to_vec());
        blocking(&self.conn, move |conn| Self::query_locked(conn, &sql, &params)).await
    }

    async fn query_one(&self, sql: &str, params: &[Value]) -> OrmResult<Row> {
        let rows = DatabaseBackend::query(self, sql, params).await?;
        single_row(rows)
    }
}

fn single_row(mut rows: Vec<Row>) -> OrmResult<Row> {
    match rows.len() {
        0 => Err(OrmError::DoesNotExist("No rows returned".to_string())),
        1 => Ok(rows.remove(0)),
        n => Err(OrmError::MultipleObjectsReturned(format!(
            "Expected 1 row, got {n}"
        ))),
    }
}

#[async_trait::async_trait]
impl DbExecutor for SqliteBackend {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        self.execute(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        DatabaseBackend::query(self, sql, params).await
    }

    async fn query_one(&self, sql: &str, params: &[Value]) -> OrmResult<Row> {
        DatabaseBackend::query_one(self, sql, params).await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> OrmResult<Value> {
        tracing::debug!(sql, params = params.len(), "insert");
        let (sql, params) = (sql.to_string(), params.to_vec());
        blocking(&self.conn, move |conn| Self::insert_locked(conn, &sql, &params)).await
    }

    async fn reserve(&self) -> OrmResult<Option<Box<dyn DbExecutor>>> {
        Ok(Some(Box::new(self.reserve_connection().await?)))
    }
}

#[async_trait::async_trait]
impl DbExecutor for ReservedConnection {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        tracing::debug!(sql, params = params.len(), "execute");
        let (sql, params) = (sql.to_string(), params.to_vec());
        blocking(&self.conn, move |conn| {
            SqliteBackend::execute_locked(conn, &sql, &params)
        })
        .await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        tracing::debug!(sql, params = params.len(), "query");
        let (sql, params) = (sql.to_string(), params.to_vec());
        blocking(&self.conn, move |conn| {
            SqliteBackend::query_locked(conn, &sql, &params)
        })
        .await
    }

    async fn query_one(&self, sql: &str, params: &[Value]) -> OrmResult<Row> {
        single_row(DbExecutor::query(self, sql, params).await?)
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> OrmResult<Value> {
        tracing::debug!(sql, params = params.len(), "insert");
        let (sql, params) = (sql.to_string(), params.to_vec());
        blocking(&self.conn, move |conn| {
            SqliteBackend::insert_locked(conn, &sql, &params)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormbook_db::{Lookup, OrderBy, Query, WhereNode};

    async fn people() -> SqliteBackend {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute(
                "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE, age INTEGER)",
                &[],
            )
            .await
            .unwrap();
        for (name, age) in [("Alice", 30), ("Bob", 25), ("Charlie", 35)] {
            backend
                .execute(
                    "INSERT INTO people (name, age) VALUES (?, ?)",
                    &[Value::from(name), Value::from(age)],
                )
                .await
                .unwrap();
        }
        backend
    }

    #[tokio::test]
    async fn test_sqlite_memory_open() {
        let backend = SqliteBackend::memory().unwrap();
        assert_eq!(backend.vendor(), "sqlite");
        assert_eq!(
            DatabaseBackend::backend_type(&backend),
            DatabaseBackendType::SQLite
        );
        assert_eq!(backend.path().to_str(), Some(":memory:"));
    }

    #[tokio::test]
    async fn test_sqlite_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.db");
        let config = DatabaseConfig::sqlite_file(path.to_string_lossy());
        let backend = SqliteBackend::from_config(&config).unwrap();
        backend
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[])
            .await
            .unwrap();
        assert!(path.exists());

        let row = DatabaseBackend::query_one(&backend, "PRAGMA journal_mode", &[])
            .await
            .unwrap();
        assert_eq!(row.get_by_index::<String>(0).unwrap(), "wal");
    }

    #[tokio::test]
    async fn test_sqlite_insert_and_query() {
        let backend = people().await;
        let rows = DatabaseBackend::query(&backend, "SELECT id, name, age FROM people ORDER BY id", &[])
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get::<String>("name").unwrap(), "Alice");
        assert_eq!(rows[0].get::<i64>("age").unwrap(), 30);
    }

    #[tokio::test]
    async fn test_sqlite_query_one_not_found_and_multiple() {
        let backend = people().await;
        let missing =
            DatabaseBackend::query_one(&backend, "SELECT id FROM people WHERE id = ?", &[Value::from(999)])
                .await;
        assert!(matches!(missing, Err(OrmError::DoesNotExist(_))));

        let many = DatabaseBackend::query_one(&backend, "SELECT id FROM people", &[]).await;
        assert!(matches!(many, Err(OrmError::MultipleObjectsReturned(_))));
    }

    #[tokio::test]
    async fn test_sqlite_null_and_float_handling() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, bio TEXT, price REAL)", &[])
            .await
            .unwrap();
        backend
            .execute(
                "INSERT INTO t (bio, price) VALUES (?, ?)",
                &[Value::Null, Value::from(19.99)],
            )
            .await
            .unwrap();

        let row = DatabaseBackend::query_one(&backend, "SELECT bio, price FROM t", &[])
            .await
            .unwrap();
        assert_eq!(row.get::<Option<String>>("bio").unwrap(), None);
        let price: f64 = row.get("price").unwrap();
        assert!((price - 19.99).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_sqlite_blob_handling() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, data BLOB)", &[])
            .await
            .unwrap();
        let blob = vec![0xDE_u8, 0xAD, 0xBE, 0xEF];
        backend
            .execute("INSERT INTO t (data) VALUES (?)", &[Value::Bytes(blob.clone())])
            .await
            .unwrap();

        let rows = DatabaseBackend::query(&backend, "SELECT data FROM t", &[])
            .await
            .unwrap();
        assert_eq!(rows[0].get_value("data"), Some(&Value::Bytes(blob)));
    }

    #[tokio::test]
    async fn test_sqlite_boolean_values() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute("CREATE TABLE flags (id INTEGER PRIMARY KEY, active INTEGER)", &[])
            .await
            .unwrap();
        backend
            .execute("INSERT INTO flags (active) VALUES (?)", &[Value::Bool(true)])
            .await
            .unwrap();

        let row = DatabaseBackend::query_one(&backend, "SELECT active FROM flags", &[])
            .await
            .unwrap();
        // SQLite stores booleans as integers
        assert_eq!(row.get::<i64>("active").unwrap(), 1);
        assert!(row.get::<bool>("active").unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_unique_violation_is_integrity_error() {
        let backend = people().await;
        let err = backend
            .execute("INSERT INTO people (name, age) VALUES (?, ?)", &[Value::from("Alice"), Value::from(1)])
            .await
            .unwrap_err();
        assert!(err.is_integrity_error());
    }

    #[tokio::test]
    async fn test_sqlite_foreign_keys_enforced() {
        let backend = people().await;
        backend
            .execute(
                "CREATE TABLE pets (id INTEGER PRIMARY KEY, owner_id INTEGER NOT NULL, \
                 FOREIGN KEY (owner_id) REFERENCES people (id) ON DELETE CASCADE)",
                &[],
            )
            .await
            .unwrap();
        let err = backend
            .execute("INSERT INTO pets (owner_id) VALUES (?)", &[Value::from(42)])
            .await
            .unwrap_err();
        assert!(err.is_integrity_error());

        backend
            .execute("INSERT INTO pets (owner_id) VALUES (?)", &[Value::from(1)])
            .await
            .unwrap();
        backend
            .execute("DELETE FROM people WHERE id = ?", &[Value::from(1)])
            .await
            .unwrap();
        let rows = DatabaseBackend::query(&backend, "SELECT id FROM pets", &[])
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_syntax_error_is_database_error() {
        let backend = SqliteBackend::memory().unwrap();
        let err = backend.execute("SELEC 1", &[]).await.unwrap_err();
        assert!(matches!(err, OrmError::DatabaseError(_)));
    }

    #[tokio::test]
    async fn test_sqlite_insert_returning_id() {
        let backend = people().await;
        let id = backend
            .insert_returning_id(
                "INSERT INTO people (name, age) VALUES (?, ?)",
                &[Value::from("Dora"), Value::from(41)],
            )
            .await
            .unwrap();
        assert_eq!(id, Value::Int(4));
    }

    #[tokio::test]
    async fn test_sqlite_compiled_select_with_where() {
        let backend = people().await;
        let mut query = Query::new("people");
        query.where_clause = Some(WhereNode::Condition {
            column: "age".to_string(),
            lookup: Lookup::Gt(Value::from(28)),
        });
        query.order_by = vec![OrderBy::asc("name")];

        let (sql, params) = backend.compiler().compile_select(&query);
        let rows = DatabaseBackend::query(&backend, &sql, &params).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get::<String>("name").unwrap(), "Alice");
        assert_eq!(rows[1].get::<String>("name").unwrap(), "Charlie");
    }

    #[tokio::test]
    async fn test_sqlite_compiled_update_and_delete() {
        let backend = people().await;
        let compiler = backend.compiler();
        let by_id = WhereNode::Condition {
            column: "id".to_string(),
            lookup: Lookup::Exact(Value::from(1)),
        };

        let (sql, params) =
            compiler.compile_update("people", &[("name", Value::from("Alicia"))], &by_id);
        assert_eq!(backend.execute(&sql, &params).await.unwrap(), 1);

        let (sql, params) = compiler.compile_delete("people", &by_id);
        assert_eq!(backend.execute(&sql, &params).await.unwrap(), 1);
        assert_eq!(backend.execute(&sql, &params).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_transaction_rollback() {
        let backend = people().await;
        backend.execute("BEGIN", &[]).await.unwrap();
        backend
            .execute("DELETE FROM people", &[])
            .await
            .unwrap();
        backend.execute("ROLLBACK", &[]).await.unwrap();

        let rows = DatabaseBackend::query(&backend, "SELECT id FROM people", &[])
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reserved_connection_holds_off_other_statements() {
        let backend = Arc::new(people().await);
        let reserved = backend.reserve_connection().await.unwrap();
        reserved.execute_sql("BEGIN", &[]).await.unwrap();
        reserved
            .execute_sql(
                "INSERT INTO people (name, age) VALUES (?, ?)",
                &[Value::from("Dora"), Value::from(41)],
            )
            .await
            .unwrap();

        let other = Arc::clone(&backend);
        let mut count = tokio::spawn(async move {
            DatabaseBackend::query_one(&*other, "SELECT COUNT(*) AS n FROM people", &[])
                .await
                .and_then(|row| row.get::<i64>("n"))
        });
        let waited = tokio::time::timeout(std::time::Duration::from_millis(100), &mut count).await;
        assert!(waited.is_err(), "statement ran inside another caller's transaction");

        reserved.execute_sql("COMMIT", &[]).await.unwrap();
        drop(reserved);
        assert_eq!(count.await.unwrap().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_dropped_reservation_rolls_back_open_transaction() {
        let backend = people().await;
        let reserved = backend.reserve_connection().await.unwrap();
        reserved.execute_sql("BEGIN", &[]).await.unwrap();
        reserved
            .execute_sql("DELETE FROM people", &[])
            .await
            .unwrap();
        drop(reserved);

        let rows = DatabaseBackend::query(&backend, "SELECT id FROM people", &[])
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        backend.execute("BEGIN", &[]).await.unwrap();
        backend.execute("ROLLBACK", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_reserved_insert_returns_rowid() {
        let backend = people().await;
        let reserved = DbExecutor::reserve(&backend).await.unwrap().unwrap();
        let id = reserved
            .insert_returning_id(
                "INSERT INTO people (name, age) VALUES (?, ?)",
                &[Value::from("Eve"), Value::from(22)],
            )
            .await
            .unwrap();
        assert_eq!(id, Value::Int(4));
        let row = reserved
            .query_one("SELECT name FROM people WHERE id = 4", &[])
            .await
            .unwrap();
        assert_eq!(row.get::<String>("name").unwrap(), "Eve");
    }
}
