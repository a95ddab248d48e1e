//! Query counting assertions for database tests.
//!
//! [`assert_num_queries`] counts the SQL statements executed during an async
//! closure and asserts that the count matches. This is how tests pin down
//! that `select_related` really is one query and that a `none()` queryset
//! never reaches the database.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ormbook_test::test_database::TestDatabase;
//! use ormbook_test::assert_queries::assert_num_queries;
//! use ormbook_db::DbExecutor;
//! use ormbook_db::value::Value;
//!
//! async fn example() {
//!     let db = TestDatabase::new().unwrap();
//!     db.execute_raw("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT)")
//!         .await
//!         .unwrap();
//!
//!     assert_num_queries(&db, 1, || async {
//!         db.execute_sql("INSERT INTO t (val) VALUES (?)", &[Value::from("x")])
//!             .await
//!             .unwrap();
//!     })
//!     .await;
//! }
//! ```

use std::future::Future;

use crate::test_database::TestDatabase;

/// Asserts that exactly `expected_count` SQL statements are executed during
/// the async closure.
///
/// The log is cleared before the closure runs. On failure the captured SQL is
/// part of the panic message.
///
/// # Panics
///
/// Panics if the number of statements does not match `expected_count`.
pub async fn assert_num_queries<F, Fut>(db: &TestDatabase, expected_count: usize, f: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    db.reset_query_count();
    f().await;
    let actual = db.query_count();
    assert_eq!(
        actual,
        expected_count,
        "Expected {expected_count} SQL queries, but {actual} were executed: {:#?}",
        db.captured_sql()
    );
}

/// Asserts that at most `max_count` SQL statements are executed during the
/// async closure.
///
/// # Panics
///
/// Panics if more than `max_count` statements are executed.
pub async fn assert_max_queries<F, Fut>(db: &TestDatabase, max_count: usize, f: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    db.reset_query_count();
    f().await;
    let actual = db.query_count();
    assert!(
        actual <= max_count,
        "Expected at most {max_count} SQL queries, but {actual} were executed: {:#?}",
        db.captured_sql()
    );
}
