//! Transaction support for the ORM.
//!
//! Transactions are managed through the [`TransactionManager`], which wraps a
//! [`DbExecutor`] and tracks nesting depth, savepoints, and on_commit
//! callbacks. The [`atomic()`] function is the usual entry point: it runs a
//! closure inside a transaction, committing on `Ok` and rolling back on
//! `Err`.
//!
//! Nested blocks (see [`TransactionManager::atomic_block`]) become savepoints
//! rather than nested transactions.
//!
//! # Examples
//!
//! ```ignore
//! use ormbook_db::transactions::atomic;
//!
//! let id = atomic(db, |txn| async move {
//!     let id = txn.insert_returning_id("INSERT INTO users (name) VALUES (?)", &params).await?;
//!     txn.execute_sql("INSERT INTO profiles (user_id, age) VALUES (?, ?)", &more).await?;
//!     Ok(id)
//! })
//! .await?;
//! ```

use crate::executor::DbExecutor;
use crate::query::compiler::{DatabaseBackendType, Row};
use crate::value::Value;
use ormbook_core::{OrmError, OrmResult};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Counter for generating unique savepoint names.
static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// State of a savepoint within a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    /// The unique name of this savepoint.
    pub name: String,
    /// Whether this savepoint has been released.
    pub released: bool,
    /// Whether this savepoint has been rolled back.
    pub rolled_back: bool,
}

impl Savepoint {
    /// Creates a new savepoint with an auto-generated unique name.
    pub fn new() -> Self {
        let id = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self::named(format!("sp_{id}"))
    }

    /// Creates a savepoint with a caller-chosen name.
    ///
    /// The name is spliced into SQL, so only ASCII letters, digits, and `_`
    /// are accepted.
    pub fn with_name(name: impl Into<String>) -> OrmResult<Self> {
        let name = name.into();
        let valid = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(OrmError::SuspiciousOperation(format!(
                "Invalid savepoint name '{name}'"
            )));
        }
        Ok(Self::named(name))
    }

    fn named(name: String) -> Self {
        Self {
            name,
            released: false,
            rolled_back: false,
        }
    }
}

impl Default for Savepoint {
    fn default() -> Self {
        Self::new()
    }
}

/// A list of callbacks to be executed after a transaction commits.
type OnCommitCallbacks = Vec<Box<dyn FnOnce() + Send + 'static>>;

/// The executor a transaction runs its statements on.
enum Conn<'a> {
    Shared(&'a dyn DbExecutor),
    /// Obtained from [`DbExecutor::reserve`]; released when the manager drops.
    Reserved(Box<dyn DbExecutor>),
}

/// Manages transaction state for a database connection.
///
/// `TransactionManager` is itself a [`DbExecutor`], so querysets and CRUD
/// helpers can run against it unchanged inside a transaction.
pub struct TransactionManager<'a> {
    conn: Conn<'a>,
    /// 0 = no transaction, 1 = outermost, 2+ = savepoint.
    depth: Arc<Mutex<u32>>,
    /// Stack of active savepoints (for nested atomic blocks).
    savepoints: Arc<Mutex<Vec<Savepoint>>>,
    /// Callbacks registered to run after the outermost transaction commits.
    on_commit_callbacks: Arc<Mutex<OnCommitCallbacks>>,
}

impl<'a> TransactionManager<'a> {
    /// Creates a new transaction manager for the given executor.
    pub fn new(db: &'a dyn DbExecutor) -> Self {
        Self::with_conn(Conn::Shared(db))
    }

    /// Creates a manager that owns a reserved executor.
    pub fn reserved(db: Box<dyn DbExecutor>) -> Self {
        Self::with_conn(Conn::Reserved(db))
    }

    fn with_conn(conn: Conn<'a>) -> Self {
        Self {
            conn,
            depth: Arc::new(Mutex::new(0)),
            savepoints: Arc::new(Mutex::new(Vec::new())),
            on_commit_callbacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the current transaction nesting depth.
    pub async fn depth(&self) -> u32 {
        *self.depth.lock().await
    }

    /// Returns the underlying executor.
    pub fn executor(&self) -> &dyn DbExecutor {
        match &self.conn {
            Conn::Shared(db) => *db,
            Conn::Reserved(db) => db.as_ref(),
        }
    }

    /// Begins a transaction, or creates a savepoint if one is already open.
    pub async fn begin(&self) -> OrmResult<()> {
        let mut depth = self.depth.lock().await;
        if *depth == 0 {
            self.executor().execute_sql("BEGIN", &[]).await?;
            tracing::debug!("transaction begin");
        } else {
            let sp = Savepoint::new();
            let sql = format!("SAVEPOINT {}", sp.name);
            self.executor().execute_sql(&sql, &[]).await?;
            tracing::debug!(savepoint = %sp.name, depth = *depth, "savepoint created");
            self.savepoints.lock().await.push(sp);
        }
        *depth += 1;
        Ok(())
    }

    /// Commits the current transaction or releases the current savepoint.
    ///
    /// on_commit callbacks run only when the outermost transaction commits.
    pub async fn commit(&self) -> OrmResult<()> {
        let mut depth = self.depth.lock().await;
        match *depth {
            0 => {
                return Err(OrmError::DatabaseError(
                    "Cannot commit: not in a transaction".to_string(),
                ))
            }
            1 => {
                self.executor().execute_sql("COMMIT", &[]).await?;
                *depth = 0;
                drop(depth);
                tracing::debug!("transaction committed");

                let callbacks = std::mem::take(&mut *self.on_commit_callbacks.lock().await);
                for cb in callbacks {
                    cb();
                }
            }
            _ => {
                let mut savepoints = self.savepoints.lock().await;
                if let Some(mut sp) = savepoints.pop() {
                    let sql = format!("RELEASE SAVEPOINT {}", sp.name);
                    self.executor().execute_sql(&sql, &[]).await?;
                    sp.released = true;
                    tracing::debug!(savepoint = %sp.name, "savepoint released");
                }
                *depth -= 1;
            }
        }
        Ok(())
    }

    /// Rolls back the current transaction or savepoint.
    ///
    /// Rolling back the outermost transaction discards pending callbacks.
    pub async fn rollback(&self) -> OrmResult<()> {
        let mut depth = self.depth.lock().await;
        match *depth {
            0 => {
                return Err(OrmError::DatabaseError(
                    "Cannot rollback: not in a transaction".to_string(),
                ))
            }
            1 => {
                self.executor().execute_sql("ROLLBACK", &[]).await?;
                *depth = 0;
                self.on_commit_callbacks.lock().await.clear();
                tracing::debug!("transaction rolled back");
            }
            _ => {
                let mut savepoints = self.savepoints.lock().await;
                if let Some(mut sp) = savepoints.pop() {
                    let sql = format!("ROLLBACK TO SAVEPOINT {}", sp.name);
                    self.executor().execute_sql(&sql, &[]).await?;
                    sp.rolled_back = true;
                    tracing::debug!(savepoint = %sp.name, "rolled back to savepoint");
                }
                *depth -= 1;
            }
        }
        Ok(())
    }

    /// Runs `fut` inside a transaction level: BEGIN at the outermost level,
    /// a savepoint when nested.
    ///
    /// On `Err` only this level is undone and the error is returned as-is.
    pub async fn atomic_block<Fut, T>(&self, fut: Fut) -> OrmResult<T>
    where
        Fut: Future<Output = OrmResult<T>>,
    {
        self.begin().await?;
        match fut.await {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Creates a named savepoint within the current transaction.
    pub async fn create_savepoint(&self, name: impl Into<String>) -> OrmResult<Savepoint> {
        let sp = Savepoint::with_name(name)?;
        if *self.depth.lock().await == 0 {
            return Err(OrmError::DatabaseError(
                "Cannot create savepoint: not in a transaction".to_string(),
            ));
        }

        let sql = format!("SAVEPOINT {}", sp.name);
        self.executor().execute_sql(&sql, &[]).await?;
        self.savepoints.lock().await.push(sp.clone());
        Ok(sp)
    }

    /// Releases a named savepoint.
    pub async fn release_savepoint(&self, name: &str) -> OrmResult<()> {
        let mut savepoints = self.savepoints.lock().await;
        let sp = savepoints
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| OrmError::DatabaseError(format!("Unknown savepoint '{name}'")))?;
        self.executor()
            .execute_sql(&format!("RELEASE SAVEPOINT {name}"), &[])
            .await?;
        sp.released = true;
        Ok(())
    }

    /// Rolls back to a named savepoint.
    pub async fn rollback_to_savepoint(&self, name: &str) -> OrmResult<()> {
        let mut savepoints = self.savepoints.lock().await;
        let sp = savepoints
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| OrmError::DatabaseError(format!("Unknown savepoint '{name}'")))?;
        self.executor()
            .execute_sql(&format!("ROLLBACK TO SAVEPOINT {name}"), &[])
            .await?;
        sp.rolled_back = true;
        Ok(())
    }

    /// Registers a callback to run after the outermost transaction commits.
    ///
    /// Outside a transaction the callback runs immediately. If the
    /// transaction is rolled back, the callback is discarded.
    pub async fn on_commit<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let depth = self.depth.lock().await;
        if *depth == 0 {
            drop(depth);
            callback();
        } else {
            self.on_commit_callbacks.lock().await.push(Box::new(callback));
        }
    }

    /// Returns the number of pending on_commit callbacks.
    pub async fn pending_callbacks(&self) -> usize {
        self.on_commit_callbacks.lock().await.len()
    }
}

#[async_trait::async_trait]
impl DbExecutor for TransactionManager<'_> {
    fn backend_type(&self) -> DatabaseBackendType {
        self.executor().backend_type()
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        self.executor().execute_sql(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        self.executor().query(sql, params).await
    }

    async fn query_one(&self, sql: &str, params: &[Value]) -> OrmResult<Row> {
        self.executor().query_one(sql, params).await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> OrmResult<Value> {
        self.executor().insert_returning_id(sql, params).await
    }
}

/// Executes a closure within a database transaction.
///
/// If the closure returns `Ok`, the transaction is committed. If it returns
/// `Err`, the transaction is rolled back and that same error is returned.
///
/// The connection is reserved through [`DbExecutor::reserve`] before
/// `BEGIN`, so other tasks sharing `db` wait for the transaction to finish.
/// Inside the closure, run statements on `txn`; using `db` there waits on
/// the transaction itself.
pub async fn atomic<'a, F, Fut, T>(db: &'a dyn DbExecutor, f: F) -> OrmResult<T>
where
    F: FnOnce(Arc<TransactionManager<'a>>) -> Fut,
    Fut: Future<Output = OrmResult<T>>,
{
    let txn = match db.reserve().await? {
        Some(conn) => TransactionManager::reserved(conn),
        None => TransactionManager::new(db),
    };
    let txn = Arc::new(txn);
    txn.atomic_block(f(Arc::clone(&txn))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex as TokioMutex;

    /// A mock database executor that records SQL statements.
    struct MockDb {
        statements: TokioMutex<Vec<String>>,
    }

    impl MockDb {
        fn new() -> Self {
            Self {
                statements: TokioMutex::new(Vec::new()),
            }
        }

        async fn statements(&self) -> Vec<String> {
            self.statements.lock().await.clone()
        }
    }

    #[async_trait::async_trait]
    impl DbExecutor for MockDb {
        fn backend_type(&self) -> DatabaseBackendType {
            DatabaseBackendType::SQLite
        }

        async fn execute_sql(&self, sql: &str, _params: &[Value]) -> OrmResult<u64> {
            self.statements.lock().await.push(sql.to_string());
            Ok(1)
        }

        async fn query(&self, sql: &str, _params: &[Value]) -> OrmResult<Vec<Row>> {
            self.statements.lock().await.push(sql.to_string());
            Ok(vec![])
        }

        async fn query_one(&self, sql: &str, _params: &[Value]) -> OrmResult<Row> {
            self.statements.lock().await.push(sql.to_string());
            Ok(Row::new(vec!["id".to_string()], vec![Value::Int(1)]))
        }

        async fn insert_returning_id(&self, sql: &str, _params: &[Value]) -> OrmResult<Value> {
            self.statements.lock().await.push(sql.to_string());
            Ok(Value::Int(1))
        }
    }

    #[tokio::test]
    async fn test_commit_on_ok() {
        let db = MockDb::new();
        let result = atomic(&db, |txn| async move {
            txn.execute_sql("INSERT INTO t (a) VALUES (1)", &[]).await?;
            Ok(42)
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(
            db.statements().await,
            vec!["BEGIN", "INSERT INTO t (a) VALUES (1)", "COMMIT"]
        );
    }

    #[tokio::test]
    async fn test_rollback_returns_original_error() {
        let db = MockDb::new();
        let result: OrmResult<()> = atomic(&db, |_txn| async move {
            Err(OrmError::IntegrityError("UNIQUE constraint failed".to_string()))
        })
        .await;

        assert!(result.unwrap_err().is_integrity_error());
        assert_eq!(db.statements().await, vec!["BEGIN", "ROLLBACK"]);
    }

    #[tokio::test]
    async fn test_nested_block_uses_savepoint() {
        let db = MockDb::new();
        atomic(&db, |txn| async move {
            txn.execute_sql("A", &[]).await?;
            let inner: OrmResult<()> = txn
                .atomic_block(async {
                    txn.execute_sql("B", &[]).await?;
                    Err(OrmError::DatabaseError("inner".into()))
                })
                .await;
            assert!(inner.is_err());
            txn.execute_sql("C", &[]).await?;
            Ok(())
        })
        .await
        .unwrap();

        let stmts = db.statements().await;
        assert_eq!(stmts[0], "BEGIN");
        assert!(stmts[2].starts_with("SAVEPOINT sp_"));
        assert_eq!(stmts[3], "B");
        assert!(stmts[4].starts_with("ROLLBACK TO SAVEPOINT sp_"));
        assert_eq!(stmts[5], "C");
        assert_eq!(stmts[6], "COMMIT");
    }

    #[tokio::test]
    async fn test_nested_block_release_on_ok() {
        let db = MockDb::new();
        atomic(&db, |txn| async move {
            txn.atomic_block(async { Ok(()) }).await?;
            assert_eq!(txn.depth().await, 1);
            Ok(())
        })
        .await
        .unwrap();
        let stmts = db.statements().await;
        assert!(stmts[2].starts_with("RELEASE SAVEPOINT sp_"));
    }

    #[tokio::test]
    async fn test_on_commit_runs_after_commit() {
        let db = MockDb::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        atomic(&db, |txn| async move {
            txn.on_commit(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await;
            assert_eq!(txn.pending_callbacks().await, 1);
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_on_commit_dropped_on_rollback() {
        let db = MockDb::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let _ = atomic(&db, |txn| async move {
            txn.on_commit(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await;
            Err::<(), _>(OrmError::DatabaseError("boom".into()))
        })
        .await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_on_commit_immediate_outside_transaction() {
        let db = MockDb::new();
        let txn = TransactionManager::new(&db);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        txn.on_commit(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_named_savepoints() {
        let db = MockDb::new();
        let txn = TransactionManager::new(&db);
        txn.begin().await.unwrap();
        let sp = txn.create_savepoint("before_profile").await.unwrap();
        assert_eq!(sp.name, "before_profile");
        txn.rollback_to_savepoint("before_profile").await.unwrap();
        txn.release_savepoint("before_profile").await.unwrap();
        assert!(txn.release_savepoint("missing").await.is_err());
        txn.commit().await.unwrap();

        assert_eq!(
            db.statements().await,
            vec![
                "BEGIN",
                "SAVEPOINT before_profile",
                "ROLLBACK TO SAVEPOINT before_profile",
                "RELEASE SAVEPOINT before_profile",
                "COMMIT",
            ]
        );
    }

    #[tokio::test]
    async fn test_savepoint_name_rejected() {
        let db = MockDb::new();
        let txn = TransactionManager::new(&db);
        txn.begin().await.unwrap();
        let err = txn.create_savepoint("x; DROP TABLE users").await.unwrap_err();
        assert_eq!(err.kind(), "suspicious_operation");
    }

    #[tokio::test]
    async fn test_errors_outside_transaction() {
        let db = MockDb::new();
        let txn = TransactionManager::new(&db);
        assert!(txn.commit().await.is_err());
        assert!(txn.rollback().await.is_err());
        assert!(txn.create_savepoint("sp").await.is_err());
        assert!(db.statements().await.is_empty());
    }

    #[tokio::test]
    async fn test_depth_tracking() {
        let db = MockDb::new();
        let txn = TransactionManager::new(&db);
        assert_eq!(txn.depth().await, 0);
        txn.begin().await.unwrap();
        txn.begin().await.unwrap();
        assert_eq!(txn.depth().await, 2);
        txn.commit().await.unwrap();
        txn.commit().await.unwrap();
        assert_eq!(txn.depth().await, 0);
    }

    #[tokio::test]
    async fn test_manager_forwards_as_executor() {
        let db = MockDb::new();
        let txn = TransactionManager::new(&db);
        let id = txn.insert_returning_id("INSERT", &[]).await.unwrap();
        assert_eq!(id, Value::Int(1));
        assert_eq!(txn.backend_type(), DatabaseBackendType::SQLite);
        assert_eq!(txn.executor().backend_type(), DatabaseBackendType::SQLite);
    }

    /// Hands out a reserved executor that tags the statements it runs.
    struct ReservingDb {
        log: Arc<TokioMutex<Vec<String>>>,
        tag: &'static str,
    }

    #[async_trait::async_trait]
    impl DbExecutor for ReservingDb {
        fn backend_type(&self) -> DatabaseBackendType {
            DatabaseBackendType::SQLite
        }

        async fn execute_sql(&self, sql: &str, _params: &[Value]) -> OrmResult<u64> {
            self.log.lock().await.push(format!("{}{sql}", self.tag));
            Ok(1)
        }

        async fn query(&self, _sql: &str, _params: &[Value]) -> OrmResult<Vec<Row>> {
            Ok(vec![])
        }

        async fn query_one(&self, _sql: &str, _params: &[Value]) -> OrmResult<Row> {
            Err(OrmError::DoesNotExist("none".into()))
        }

        async fn reserve(&self) -> OrmResult<Option<Box<dyn DbExecutor>>> {
            Ok(Some(Box::new(Self {
                log: Arc::clone(&self.log),
                tag: "reserved: ",
            })))
        }
    }

    #[tokio::test]
    async fn test_atomic_runs_on_reserved_executor() {
        let log = Arc::new(TokioMutex::new(Vec::new()));
        let db = ReservingDb {
            log: Arc::clone(&log),
            tag: "",
        };
        atomic(&db, |txn| async move {
            txn.execute_sql("A", &[]).await?;
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(
            *log.lock().await,
            vec!["reserved: BEGIN", "reserved: A", "reserved: COMMIT"]
        );
    }

    #[test]
    fn test_savepoint_auto_names_are_unique() {
        let a = Savepoint::new();
        let b = Savepoint::default();
        assert_ne!(a.name, b.name);
        assert!(a.name.starts_with("sp_"));
    }
}
