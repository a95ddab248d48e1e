//! # ormbook-test
//!
//! Testing utilities for ormbook. Provides [`TestDatabase`], a fresh
//! in-memory SQLite database that records every statement it runs, and
//! [`assert_num_queries`]/[`assert_max_queries`] for catching N+1 query
//! regressions.

pub mod assert_queries;
pub mod test_database;

pub use assert_queries::{assert_max_queries, assert_num_queries};
pub use test_database::TestDatabase;
