//! Database executor trait and model CRUD operations.
//!
//! [`DbExecutor`] is the minimal async interface that querysets, raw queries,
//! transactions, and the CRUD helpers below run against. Backends in
//! `ormbook-db-backends` implement it; so does
//! [`TransactionManager`](crate::transactions::TransactionManager), which
//! lets the same code run inside a transaction.

use crate::model::Model;
use crate::query::compiler::{DatabaseBackendType, Query, Row, SqlCompiler, WhereNode};
use crate::query::lookups::Lookup;
use crate::value::Value;
use ormbook_core::{OrmError, OrmResult};

/// Minimal async database executor trait.
///
/// This trait lives in the ORM crate rather than the backends crate so that
/// execution can be defined without circular dependencies.
#[async_trait::async_trait]
pub trait DbExecutor: Send + Sync {
    /// Returns the backend type for SQL compilation.
    fn backend_type(&self) -> DatabaseBackendType;

    /// Runs a SQL statement that does not return rows.
    /// Returns the number of rows affected.
    async fn execute_sql(&self, sql: &str, params: &[Value]) -> OrmResult<u64>;

    /// Runs a SQL query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>>;

    /// Runs a SQL query and returns exactly one row.
    /// Returns `DoesNotExist` if no rows, `MultipleObjectsReturned` if more than one.
    async fn query_one(&self, sql: &str, params: &[Value]) -> OrmResult<Row>;

    /// Executes an INSERT and returns the new row's primary key.
    ///
    /// The default issues the INSERT and then asks for the last id in a second
    /// statement; backends holding a connection lock should override it so
    /// both happen under one lock.
    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> OrmResult<Value> {
        self.execute_sql(sql, params).await?;
        let id_sql = match self.backend_type() {
            DatabaseBackendType::SQLite => "SELECT last_insert_rowid() AS id",
            DatabaseBackendType::PostgreSQL => "SELECT LASTVAL() AS id",
        };
        let rows = self.query(id_sql, &[]).await?;
        match rows.first() {
            Some(row) => row.get::<Value>("id"),
            None => Err(OrmError::DatabaseError(
                "Failed to retrieve last inserted ID".to_string(),
            )),
        }
    }

    /// Reserves the underlying connection for one caller.
    ///
    /// Backends that share a connection between tasks return an executor
    /// that has it to itself until dropped; statements issued through `self`
    /// meanwhile wait. `None` means `self` needs no reservation.
    async fn reserve(&self) -> OrmResult<Option<Box<dyn DbExecutor>>> {
        Ok(None)
    }
}

// ── Model CRUD free functions ──────────────────────────────────────────

fn pk_condition<M: Model>(pk: Value) -> WhereNode {
    WhereNode::Condition {
        column: M::pk_field_name().to_string(),
        lookup: Lookup::Exact(pk),
    }
}

/// Saves a model instance to the database.
///
/// With the primary key set, performs an UPDATE of all other fields.
/// Otherwise performs an INSERT and stores the generated key on the model.
/// Field values are checked with [`Model::clean_fields`] first.
pub async fn save_model<M: Model>(model: &mut M, db: &dyn DbExecutor) -> OrmResult<()> {
    model.clean_fields()?;
    let compiler = SqlCompiler::new(db.backend_type());

    match model.pk() {
        Some(pk) => {
            let fields = model.non_pk_field_values();
            if fields.is_empty() {
                return Ok(());
            }
            let (sql, params) =
                compiler.compile_update(M::table_name(), &fields, &pk_condition::<M>(pk));
            db.execute_sql(&sql, &params).await?;
        }
        None => {
            let fields = model.non_pk_field_values();
            let (sql, params) = compiler.compile_insert(M::table_name(), &fields);
            let pk = db.insert_returning_id(&sql, &params).await?;
            model.set_pk(pk);
        }
    }

    Ok(())
}

/// Inserts a model instance and stores the generated key on it.
///
/// Always performs an INSERT, even if a primary key is already set.
pub async fn create_model<M: Model>(model: &mut M, db: &dyn DbExecutor) -> OrmResult<()> {
    model.clean_fields()?;
    let compiler = SqlCompiler::new(db.backend_type());
    let fields = model.non_pk_field_values();
    let (sql, params) = compiler.compile_insert(M::table_name(), &fields);
    let pk = db.insert_returning_id(&sql, &params).await?;
    model.set_pk(pk);
    Ok(())
}

/// Deletes a model instance by primary key.
///
/// Returns the number of rows removed (0 if it was already gone).
pub async fn delete_model<M: Model>(model: &M, db: &dyn DbExecutor) -> OrmResult<u64> {
    let pk = model.pk().ok_or_else(|| {
        OrmError::DatabaseError("Cannot delete a model without a primary key".to_string())
    })?;
    let compiler = SqlCompiler::new(db.backend_type());
    let (sql, params) = compiler.compile_delete(M::table_name(), &pk_condition::<M>(pk));
    db.execute_sql(&sql, &params).await
}

/// Reloads a model instance from the database by primary key.
pub async fn refresh_model<M: Model>(model: &mut M, db: &dyn DbExecutor) -> OrmResult<()> {
    let pk = model.pk().ok_or_else(|| {
        OrmError::DatabaseError("Cannot refresh a model without a primary key".to_string())
    })?;
    let compiler = SqlCompiler::new(db.backend_type());

    let mut query = Query::new(M::table_name());
    query.where_clause = Some(pk_condition::<M>(pk));
    query.limit = Some(1);

    let (sql, params) = compiler.compile_select(&query);
    let row = db.query_one(&sql, &params).await?;
    *model = M::from_row(&row)?;
    Ok(())
}
