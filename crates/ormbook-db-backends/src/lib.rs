//! # ormbook-db-backends
//!
//! Database backend implementations for ormbook. A backend owns the
//! connection, runs SQL produced by `ormbook-db`, and maps driver errors onto
//! [`OrmError`](ormbook_core::OrmError).
//!
//! Supported backends:
//! - `SQLite` (feature `sqlite`, on by default)

pub mod base;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use base::{DatabaseBackend, DatabaseConfig};
#[cfg(feature = "sqlite")]
pub use sqlite::{ReservedConnection, SqliteBackend};
