//! Base database backend trait and connection configuration.
//!
//! This module defines the [`DatabaseBackend`] trait that every driver
//! implements, and [`DatabaseConfig`], which says which database to open.

use ormbook_core::{OrmError, OrmResult, Settings};
use ormbook_db::query::compiler::{DatabaseBackendType, SqlCompiler};
use ormbook_db::value::Value;
use ormbook_db::Row;

/// The core trait for database backends.
///
/// A backend provides a uniform interface for executing SQL and hands out a
/// SQL compiler configured for its dialect. Transactions are not part of this
/// trait: they are plain `BEGIN`/`COMMIT`/`ROLLBACK` statements issued through
/// [`ormbook_db::transactions::TransactionManager`].
///
/// All methods are async. Backends built on synchronous drivers (like
/// `rusqlite`) wrap operations in `spawn_blocking` to keep that interface.
#[async_trait::async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// Returns the vendor name (e.g. "sqlite").
    fn vendor(&self) -> &str;

    /// Returns the backend type enum for use with the SQL compiler.
    fn backend_type(&self) -> DatabaseBackendType;

    /// Executes a SQL statement that does not return rows.
    ///
    /// Returns the number of rows affected.
    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64>;

    /// Executes a SQL query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>>;

    /// Executes a SQL query and returns exactly one row.
    ///
    /// Returns [`OrmError::DoesNotExist`] if no rows are returned, or
    /// [`OrmError::MultipleObjectsReturned`] if more than one row is returned.
    async fn query_one(&self, sql: &str, params: &[Value]) -> OrmResult<Row>;

    /// Returns a SQL compiler configured for this backend's dialect.
    fn compiler(&self) -> SqlCompiler {
        SqlCompiler::new(self.backend_type())
    }
}

/// Configuration for connecting to a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// The backend type.
    pub backend: DatabaseBackendType,
    /// The database file path, or `:memory:`.
    pub name: String,
}

impl DatabaseConfig {
    /// Creates a configuration for an in-memory SQLite database.
    pub fn sqlite_memory() -> Self {
        Self::sqlite_file(":memory:")
    }

    /// Creates a configuration for a SQLite file database.
    pub fn sqlite_file(path: impl Into<String>) -> Self {
        Self {
            backend: DatabaseBackendType::SQLite,
            name: path.into(),
        }
    }

    /// Builds a configuration from the `[database]` section of [`Settings`].
    ///
    /// Only the `sqlite` engine can be opened; anything else is
    /// [`OrmError::ImproperlyConfigured`].
    pub fn from_settings(settings: &Settings) -> OrmResult<Self> {
        let db = &settings.database;
        match db.engine.as_str() {
            "sqlite" | "sqlite3" => Ok(Self::sqlite_file(db.name.clone())),
            other => Err(OrmError::ImproperlyConfigured(format!(
                "Unsupported database engine '{other}'; only 'sqlite' is available"
            ))),
        }
    }

    /// Returns `true` for an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.name == ":memory:"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_sqlite_memory() {
        let cfg = DatabaseConfig::sqlite_memory();
        assert_eq!(cfg.backend, DatabaseBackendType::SQLite);
        assert_eq!(cfg.name, ":memory:");
        assert!(cfg.is_in_memory());
    }

    #[test]
    fn test_database_config_sqlite_file() {
        let cfg = DatabaseConfig::sqlite_file("/tmp/test.db");
        assert_eq!(cfg.backend, DatabaseBackendType::SQLite);
        assert_eq!(cfg.name, "/tmp/test.db");
        assert!(!cfg.is_in_memory());
    }

    #[test]
    fn test_from_settings_uses_database_section() {
        let mut settings = Settings::default();
        settings.database.name = "book.db".to_string();
        let cfg = DatabaseConfig::from_settings(&settings).unwrap();
        assert_eq!(cfg, DatabaseConfig::sqlite_file("book.db"));
    }

    #[test]
    fn test_from_settings_rejects_unknown_engine() {
        let mut settings = Settings::default();
        settings.database.engine = "postgresql".to_string();
        let err = DatabaseConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(err, OrmError::ImproperlyConfigured(_)));
    }
}
