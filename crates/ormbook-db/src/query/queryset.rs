//! QuerySet and Manager for building and executing database queries.
//!
//! The [`QuerySet`] represents a lazy database query that builds up a SQL query
//! AST. It only touches the database when one of the `*_exec` methods is
//! called. The [`Manager`] is the entry point for accessing querysets on a
//! model.
//!
//! # Examples
//!
//! ```
//! use ormbook_db::query::lookups::{Lookup, Q};
//! use ormbook_db::query::compiler::DatabaseBackendType;
//! # use ormbook_db::model::{Model, ModelMeta, Row};
//! # use ormbook_db::value::Value;
//! # use ormbook_core::OrmResult;
//! # struct Tag;
//! # impl Model for Tag {
//! #     fn meta() -> &'static ModelMeta {
//! #         static META: std::sync::LazyLock<ModelMeta> = std::sync::LazyLock::new(|| ModelMeta {
//! #             model_name: "tag", db_table: "tags", ordering: vec![], fields: vec![],
//! #         });
//! #         &META
//! #     }
//! #     fn pk(&self) -> Option<Value> { None }
//! #     fn set_pk(&mut self, _: Value) {}
//! #     fn field_values(&self) -> Vec<(&'static str, Value)> { vec![] }
//! #     fn from_row(_: &Row) -> OrmResult<Self> { Ok(Tag) }
//! # }
//! use ormbook_db::query::queryset::Manager;
//!
//! // Nothing runs here; the queryset only describes the query.
//! let qs = Manager::<Tag>::new().filter(Q::filter("label", Lookup::StartsWith("ru".into())));
//! let (sql, _) = qs.to_sql(DatabaseBackendType::SQLite);
//! assert_eq!(sql, "SELECT * FROM \"tags\" WHERE \"label\" LIKE ? ESCAPE '\\'");
//! ```

use super::compiler::{
    DatabaseBackendType, JoinType, OrderBy, Query, Row, SelectColumn, SqlCompiler, WhereNode,
};
use super::expressions::{AggregateFunc, Expression};
use super::lookups::{Lookup, Q};
use crate::executor::DbExecutor;
use crate::model::Model;
use crate::value::Value;
use ormbook_core::{OrmError, OrmResult};
use std::collections::HashMap;
use std::marker::PhantomData;

/// The entry point for model-level query operations.
///
/// The `Manager` itself does not hold any query state; it simply creates
/// fresh `QuerySet` instances.
#[derive(Debug)]
pub struct Manager<M: Model> {
    _phantom: PhantomData<M>,
}

impl<M: Model> Default for Manager<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Manager<M> {
    /// Creates a new manager.
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }

    /// Returns a new `QuerySet` that returns all objects.
    pub fn all(&self) -> QuerySet<M> {
        QuerySet::new()
    }

    /// Returns a new `QuerySet` with the given filter applied.
    pub fn filter(&self, q: Q) -> QuerySet<M> {
        self.all().filter(q)
    }

    /// Returns a new `QuerySet` with the given exclusion applied.
    pub fn exclude(&self, q: Q) -> QuerySet<M> {
        self.all().exclude(q)
    }

    /// Returns an empty `QuerySet` that matches nothing.
    pub fn none(&self) -> QuerySet<M> {
        self.all().none()
    }

    /// Prepares an INSERT of the given fields; run it with `create_exec`.
    pub fn create(&self, fields: Vec<(&'static str, Value)>) -> QuerySet<M> {
        let mut qs = self.all();
        qs.pending_create = Some(fields);
        qs
    }

    /// Fetches exactly one object matching `q`.
    pub async fn get(&self, q: Q, db: &dyn DbExecutor) -> OrmResult<M> {
        self.filter(q).get_exec(db).await
    }
}

/// A lazy, composable database query.
///
/// All builder methods consume `self` and return the modified queryset, so
/// chains read left to right and never share state.
pub struct QuerySet<M: Model> {
    model: PhantomData<M>,
    query: Query,
    /// Whether this queryset should return no results.
    is_none: bool,
    /// Columns chosen by `values()`, used as GROUP BY for aggregate annotations.
    values_fields: Option<Vec<String>>,
    /// Relations loaded by `select_related`.
    related: Vec<&'static str>,
    /// Problems found while building; reported by the `*_exec` methods.
    errors: Vec<String>,
    pending_create: Option<Vec<(&'static str, Value)>>,
    pending_update: Option<Vec<(&'static str, Value)>>,
    pending_delete: bool,
}

impl<M: Model> Clone for QuerySet<M> {
    fn clone(&self) -> Self {
        Self {
            model: PhantomData,
            query: self.query.clone(),
            is_none: self.is_none,
            values_fields: self.values_fields.clone(),
            related: self.related.clone(),
            errors: self.errors.clone(),
            pending_create: self.pending_create.clone(),
            pending_update: self.pending_update.clone(),
            pending_delete: self.pending_delete,
        }
    }
}

impl<M: Model> std::fmt::Debug for QuerySet<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySet")
            .field("model", &M::meta().model_name)
            .field("query", &self.query)
            .field("is_none", &self.is_none)
            .finish_non_exhaustive()
    }
}

impl<M: Model> QuerySet<M> {
    fn new() -> Self {
        Self {
            model: PhantomData,
            query: Query::new(M::table_name()),
            is_none: false,
            values_fields: None,
            related: Vec::new(),
            errors: Vec::new(),
            pending_create: None,
            pending_update: None,
            pending_delete: false,
        }
    }

    /// Returns a reference to the underlying query AST.
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Consumes the queryset and returns its query AST.
    pub fn into_query(self) -> Query {
        self.query
    }

    /// Returns this queryset as a subquery for `Lookup::InQuery`.
    ///
    /// Unless `values()` chose columns, the subquery selects the primary key.
    /// Ordering is dropped since it has no meaning inside `IN (...)`.
    pub fn as_subquery(&self) -> Query {
        let mut query = self.query.clone();
        if self.values_fields.is_none() {
            query.select = vec![SelectColumn::Column(M::pk_field_name().to_string())];
        }
        query.order_by.clear();
        if self.is_none {
            query.where_clause = Some(WhereNode::Or(Vec::new()));
        }
        query
    }

    // ── Filtering methods (lazy) ─────────────────────────────────────

    /// Adds a filter condition.
    ///
    /// A filter whose fields all name aggregate annotations is placed in
    /// HAVING rather than WHERE.
    #[must_use]
    pub fn filter(mut self, q: Q) -> Self {
        let node = WhereNode::from_q(&q);
        if self.targets_aggregates(&q) {
            self.query.having = Some(WhereNode::and_with(self.query.having.take(), node));
        } else {
            self.join_paths(&q);
            self.query.where_clause =
                Some(WhereNode::and_with(self.query.where_clause.take(), node));
        }
        self
    }

    /// Adds an exclusion condition (NOT).
    #[must_use]
    pub fn exclude(self, q: Q) -> Self {
        self.filter(!q)
    }

    /// Adds a HAVING condition directly.
    #[must_use]
    pub fn having(mut self, q: Q) -> Self {
        let node = WhereNode::from_q(&q);
        self.query.having = Some(WhereNode::and_with(self.query.having.take(), node));
        self
    }

    /// Sets the ordering, replacing any previous ordering.
    #[must_use]
    pub fn order_by(mut self, fields: Vec<OrderBy>) -> Self {
        for order in &fields {
            self.require_path(&order.column);
        }
        self.query.order_by = fields;
        self
    }

    /// Reverses the current ordering.
    #[must_use]
    pub fn reverse(mut self) -> Self {
        for order in &mut self.query.order_by {
            order.descending = !order.descending;
        }
        self
    }

    /// Selects specific columns instead of whole model rows.
    #[must_use]
    pub fn values(mut self, fields: &[&str]) -> Self {
        for field in fields {
            self.require_path(field);
        }
        self.query.select = fields
            .iter()
            .map(|f| SelectColumn::Column((*f).to_string()))
            .collect();
        self.values_fields = Some(fields.iter().map(|f| (*f).to_string()).collect());
        self
    }

    /// Makes the results distinct.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.query.distinct = true;
        self
    }

    /// Returns an empty queryset that never touches the database.
    #[must_use]
    pub fn none(mut self) -> Self {
        self.is_none = true;
        self
    }

    /// Sets LIMIT.
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.query.limit = Some(n);
        self
    }

    /// Sets OFFSET.
    #[must_use]
    pub fn offset(mut self, n: usize) -> Self {
        self.query.offset = Some(n);
        self
    }

    /// Adds a named computed column.
    ///
    /// An aggregate annotation groups by the `values()` columns, or by the
    /// primary key when no columns were chosen.
    #[must_use]
    pub fn annotate(mut self, alias: impl Into<String>, expr: Expression) -> Self {
        if expr.is_aggregate() && self.query.group_by.is_empty() {
            self.query.group_by = self
                .values_fields
                .clone()
                .unwrap_or_else(|| vec![M::pk_field_name().to_string()]);
        }
        self.query.annotations.push((alias.into(), expr));
        self
    }

    /// Loads the named relations in the same query.
    ///
    /// Each relation is LEFT JOINed (unless a filter already joined it) and
    /// its columns are selected as `<relation>__<column>`. Read them back with
    /// [`execute_with_related`](Self::execute_with_related).
    #[must_use]
    pub fn select_related(mut self, names: &[&str]) -> Self {
        for name in names {
            let Some(rel) = M::relation(name) else {
                self.errors.push(Self::unknown_relation(name));
                continue;
            };
            if self.related.contains(&rel.name) {
                continue;
            }
            if !self.query.has_join(rel.name) {
                self.query
                    .joins
                    .push(rel.join(M::table_name(), JoinType::Left));
            }
            for col in rel.columns {
                self.query.select.push(SelectColumn::Aliased {
                    column: format!("{}.{col}", rel.name),
                    alias: format!("{}__{col}", rel.name),
                });
            }
            self.related.push(rel.name);
        }
        self
    }

    /// INNER JOINs a relation without selecting its columns.
    #[must_use]
    pub fn join(mut self, name: &str) -> Self {
        match M::relation(name) {
            Some(rel) if !self.query.has_join(rel.name) => {
                self.query
                    .joins
                    .push(rel.join(M::table_name(), JoinType::Inner));
            }
            Some(_) => {}
            None => self.errors.push(Self::unknown_relation(name)),
        }
        self
    }

    /// Marks this queryset as an UPDATE of the given fields.
    #[must_use]
    pub fn update(mut self, fields: Vec<(&'static str, Value)>) -> Self {
        self.pending_update = Some(fields);
        self
    }

    /// Marks this queryset as a DELETE.
    #[must_use]
    pub fn delete(mut self) -> Self {
        self.pending_delete = true;
        self
    }

    // ── Builder helpers ──────────────────────────────────────────────

    fn unknown_relation(name: &str) -> String {
        format!(
            "Cannot resolve relation '{name}' on model '{}'",
            M::meta().model_name
        )
    }

    fn targets_aggregates(&self, q: &Q) -> bool {
        let fields = q.fields();
        !fields.is_empty()
            && fields.iter().all(|f| {
                self.query
                    .annotation(f)
                    .is_some_and(Expression::is_aggregate)
            })
    }

    fn join_paths(&mut self, q: &Q) {
        for field in q.fields() {
            self.require_path(field);
        }
    }

    /// INNER JOINs the relation named by a `relation__column` path, once.
    fn require_path(&mut self, field: &str) {
        if self.query.annotation(field).is_some() {
            return;
        }
        let Some((rel_name, _)) = field.split_once("__").filter(|(r, c)| !r.is_empty() && !c.is_empty())
        else {
            return;
        };
        if self.query.has_join(rel_name) {
            return;
        }
        match M::relation(rel_name) {
            Some(rel) => self
                .query
                .joins
                .push(rel.join(M::table_name(), JoinType::Inner)),
            None => {
                let message = Self::unknown_relation(rel_name);
                if !self.errors.contains(&message) {
                    self.errors.push(message);
                }
            }
        }
    }

    fn check(&self) -> OrmResult<()> {
        match self.errors.first() {
            Some(message) => Err(OrmError::DatabaseError(message.clone())),
            None => Ok(()),
        }
    }

    fn does_not_exist() -> OrmError {
        OrmError::DoesNotExist(format!(
            "{} matching query does not exist.",
            M::meta().model_name
        ))
    }

    /// Restricts a joined UPDATE/DELETE to `pk IN (SELECT pk ...)`.
    fn mutation_where(&self) -> WhereNode {
        if self.query.joins.is_empty() {
            return self
                .query
                .where_clause
                .clone()
                .unwrap_or_else(|| WhereNode::And(Vec::new()));
        }
        let mut inner = self.query.clone();
        inner.select = vec![SelectColumn::Column(M::pk_field_name().to_string())];
        inner.order_by.clear();
        WhereNode::Condition {
            column: M::pk_field_name().to_string(),
            lookup: Lookup::InQuery(Box::new(inner)),
        }
    }

    // ── SQL generation ───────────────────────────────────────────────

    /// Compiles the queryset to SQL for the given backend.
    ///
    /// Honors a pending create, update, or delete; otherwise a SELECT.
    pub fn to_sql(&self, backend: DatabaseBackendType) -> (String, Vec<Value>) {
        let compiler = SqlCompiler::new(backend);

        if let Some(ref fields) = self.pending_create {
            return compiler.compile_insert(&self.query.table, fields);
        }

        if self.is_none {
            let mut empty = Query::new(self.query.table.clone());
            empty.where_clause = Some(WhereNode::Or(Vec::new()));
            return compiler.compile_select(&empty);
        }

        if let Some(ref fields) = self.pending_update {
            return compiler.compile_update(&self.query.table, fields, &self.mutation_where());
        }

        if self.pending_delete {
            return compiler.compile_delete(&self.query.table, &self.mutation_where());
        }

        if self.query.order_by.is_empty() {
            let mut ordered = self.query.clone();
            ordered.order_by = self.default_ordering();
            return compiler.compile_select(&ordered);
        }
        compiler.compile_select(&self.query)
    }

    /// The model's `Meta.ordering`, unless the query is grouped.
    fn default_ordering(&self) -> Vec<OrderBy> {
        if self.query.group_by.is_empty() {
            M::meta().ordering.clone()
        } else {
            Vec::new()
        }
    }

    /// Compiles a COUNT query.
    ///
    /// Grouped, distinct, sliced, or annotated querysets are counted by
    /// wrapping them as a derived table.
    pub fn count_sql(&self, backend: DatabaseBackendType) -> (String, Vec<Value>) {
        let compiler = SqlCompiler::new(backend);
        let q = &self.query;
        let needs_wrap = q.distinct
            || !q.group_by.is_empty()
            || q.having.is_some()
            || q.limit.is_some()
            || q.offset.is_some()
            || !q.annotations.is_empty();

        if needs_wrap {
            let mut inner = q.clone();
            inner.order_by.clear();
            let (inner_sql, params) = compiler.compile_select(&inner);
            return (
                format!("SELECT COUNT(*) AS \"count\" FROM ({inner_sql}) AS \"subquery\""),
                params,
            );
        }

        let mut count_query = q.clone();
        count_query.select = vec![SelectColumn::Expression(
            Expression::count("*"),
            "count".to_string(),
        )];
        count_query.order_by.clear();
        compiler.compile_select(&count_query)
    }

    /// Compiles an EXISTS query.
    pub fn exists_sql(&self, backend: DatabaseBackendType) -> (String, Vec<Value>) {
        let mut exists_query = self.query.clone();
        exists_query.select = vec![SelectColumn::Expression(
            Expression::value(1),
            "one".to_string(),
        )];
        exists_query.order_by.clear();
        exists_query.limit = Some(1);
        let (inner_sql, params) = SqlCompiler::new(backend).compile_select(&exists_query);
        (format!("SELECT EXISTS({inner_sql}) AS \"exists\""), params)
    }

    /// Compiles a query for the first result.
    ///
    /// Unordered querysets use the model's default ordering, then the pk.
    pub fn first_sql(&self, backend: DatabaseBackendType) -> (String, Vec<Value>) {
        let mut first_query = self.query.clone();
        if first_query.order_by.is_empty() {
            first_query.order_by = self.default_ordering();
        }
        if first_query.order_by.is_empty() {
            first_query.order_by = vec![OrderBy::asc(M::pk_field_name())];
        }
        first_query.limit = Some(1);
        SqlCompiler::new(backend).compile_select(&first_query)
    }

    /// Compiles a query for the last result: the reversed ordering, limit 1.
    pub fn last_sql(&self, backend: DatabaseBackendType) -> (String, Vec<Value>) {
        let mut last_query = self.query.clone();
        if last_query.order_by.is_empty() {
            last_query.order_by = self.default_ordering();
        }
        if last_query.order_by.is_empty() {
            last_query.order_by = vec![OrderBy::desc(M::pk_field_name())];
        } else {
            for order in &mut last_query.order_by {
                order.descending = !order.descending;
            }
        }
        last_query.limit = Some(1);
        SqlCompiler::new(backend).compile_select(&last_query)
    }

    /// Compiles a query for `get_exec` (fetches two rows to detect duplicates).
    pub fn get_sql(&self, backend: DatabaseBackendType) -> (String, Vec<Value>) {
        let mut get_query = self.query.clone();
        get_query.limit = Some(2);
        SqlCompiler::new(backend).compile_select(&get_query)
    }

    /// Compiles an aggregate query over the filtered rows.
    pub fn aggregate_sql(
        &self,
        aggregates: &[(&str, Expression)],
        backend: DatabaseBackendType,
    ) -> (String, Vec<Value>) {
        let mut agg_query = self.query.clone();
        agg_query.select = aggregates
            .iter()
            .map(|(alias, expr)| SelectColumn::Expression(expr.clone(), (*alias).to_string()))
            .collect();
        agg_query.annotations.clear();
        agg_query.group_by.clear();
        agg_query.having = None;
        agg_query.order_by.clear();
        agg_query.limit = None;
        agg_query.offset = None;
        SqlCompiler::new(backend).compile_select(&agg_query)
    }

    // ── Async execution methods ───────────────────────────────────────

    /// Executes the query and returns all matching model instances.
    pub async fn execute_query(&self, db: &dyn DbExecutor) -> OrmResult<Vec<M>> {
        let rows = self.execute_rows(db).await?;
        rows.iter().map(M::from_row).collect()
    }

    /// Executes the query and returns the raw rows.
    ///
    /// Use this for `values()` and `annotate()` querysets whose rows do not
    /// have the model's shape.
    pub async fn execute_rows(&self, db: &dyn DbExecutor) -> OrmResult<Vec<Row>> {
        self.check()?;
        if self.is_none {
            return Ok(Vec::new());
        }
        let (sql, params) = self.to_sql(db.backend_type());
        db.query(&sql, &params).await
    }

    /// Executes the query and pairs each model with its `select_related`
    /// relation, or `None` when the outer join found no related row.
    pub async fn execute_with_related<R: Model>(
        &self,
        relation: &str,
        db: &dyn DbExecutor,
    ) -> OrmResult<Vec<(M, Option<R>)>> {
        if !self.related.iter().any(|r| *r == relation) {
            return Err(OrmError::DatabaseError(format!(
                "Relation '{relation}' was not loaded with select_related()"
            )));
        }
        let rows = self.execute_rows(db).await?;
        rows.iter()
            .map(|row| {
                let model = M::from_row(row)?;
                let related_row = row.related(relation);
                let missing = related_row
                    .get_value(R::pk_field_name())
                    .map_or(true, Value::is_null);
                let related = if missing {
                    None
                } else {
                    Some(R::from_row(&related_row)?)
                };
                Ok((model, related))
            })
            .collect()
    }

    /// Returns the number of matching records.
    pub async fn count_exec(&self, db: &dyn DbExecutor) -> OrmResult<i64> {
        self.check()?;
        if self.is_none {
            return Ok(0);
        }
        let (sql, params) = self.count_sql(db.backend_type());
        let row = db.query_one(&sql, &params).await?;
        row.get::<i64>("count")
    }

    /// Returns whether any record matches.
    pub async fn exists_exec(&self, db: &dyn DbExecutor) -> OrmResult<bool> {
        self.check()?;
        if self.is_none {
            return Ok(false);
        }
        let (sql, params) = self.exists_sql(db.backend_type());
        let row = db.query_one(&sql, &params).await?;
        row.get::<bool>("exists")
    }

    /// Returns the first record, or `None` if nothing matches.
    pub async fn first_exec(&self, db: &dyn DbExecutor) -> OrmResult<Option<M>> {
        self.check()?;
        if self.is_none {
            return Ok(None);
        }
        let (sql, params) = self.first_sql(db.backend_type());
        let rows = db.query(&sql, &params).await?;
        rows.first().map(M::from_row).transpose()
    }

    /// Returns the last record, or `None` if nothing matches.
    pub async fn last_exec(&self, db: &dyn DbExecutor) -> OrmResult<Option<M>> {
        self.check()?;
        if self.is_none {
            return Ok(None);
        }
        let (sql, params) = self.last_sql(db.backend_type());
        let rows = db.query(&sql, &params).await?;
        rows.first().map(M::from_row).transpose()
    }

    /// Returns the single matching record.
    ///
    /// Returns `DoesNotExist` if no records match, or
    /// `MultipleObjectsReturned` if more than one record matches.
    pub async fn get_exec(&self, db: &dyn DbExecutor) -> OrmResult<M> {
        self.check()?;
        if self.is_none {
            return Err(Self::does_not_exist());
        }

        let (sql, params) = self.get_sql(db.backend_type());
        let rows = db.query(&sql, &params).await?;
        match rows.as_slice() {
            [] => Err(Self::does_not_exist()),
            [row] => M::from_row(row),
            _ => Err(OrmError::MultipleObjectsReturned(format!(
                "get() returned more than one {}",
                M::meta().model_name
            ))),
        }
    }

    /// Computes aggregates over the matching rows, keyed by alias.
    ///
    /// On an empty queryset, COUNT aggregates are 0 and the rest are NULL.
    pub async fn aggregate_exec(
        &self,
        aggregates: &[(&str, Expression)],
        db: &dyn DbExecutor,
    ) -> OrmResult<HashMap<String, Value>> {
        self.check()?;
        if self.is_none {
            return Ok(aggregates
                .iter()
                .map(|(alias, expr)| {
                    let empty = match expr {
                        Expression::Aggregate {
                            func: AggregateFunc::Count,
                            ..
                        } => Value::Int(0),
                        _ => Value::Null,
                    };
                    ((*alias).to_string(), empty)
                })
                .collect());
        }
        let (sql, params) = self.aggregate_sql(aggregates, db.backend_type());
        let row = db.query_one(&sql, &params).await?;
        Ok(row
            .columns()
            .iter()
            .cloned()
            .zip(row.values().iter().cloned())
            .collect())
    }

    /// Runs the pending UPDATE and returns the number of rows affected.
    pub async fn update_exec(&self, db: &dyn DbExecutor) -> OrmResult<u64> {
        self.check()?;
        if self.pending_update.is_none() {
            return Err(OrmError::DatabaseError(
                "No pending update fields. Call .update(fields) before .update_exec()".to_string(),
            ));
        }
        if self.is_none {
            return Ok(0);
        }
        let (sql, params) = self.to_sql(db.backend_type());
        db.execute_sql(&sql, &params).await
    }

    /// Runs the pending DELETE and returns the number of rows affected.
    pub async fn delete_exec(&self, db: &dyn DbExecutor) -> OrmResult<u64> {
        self.check()?;
        if !self.pending_delete {
            return Err(OrmError::DatabaseError(
                "QuerySet is not marked for deletion. Call .delete() before .delete_exec()"
                    .to_string(),
            ));
        }
        if self.is_none {
            return Ok(0);
        }
        let (sql, params) = self.to_sql(db.backend_type());
        db.execute_sql(&sql, &params).await
    }

    /// Runs the pending INSERT and returns the new primary key.
    pub async fn create_exec(&self, db: &dyn DbExecutor) -> OrmResult<Value> {
        if self.pending_create.is_none() {
            return Err(OrmError::DatabaseError(
                "No pending create fields. Call Manager::create(fields) before .create_exec()"
                    .to_string(),
            ));
        }
        let (sql, params) = self.to_sql(db.backend_type());
        db.insert_returning_id(&sql, &params).await
    }
}
