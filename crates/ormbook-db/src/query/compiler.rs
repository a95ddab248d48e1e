//! SQL query AST and compiler.
//!
//! This module defines the [`Query`] AST that represents a database query, and
//! the [`SqlCompiler`] that translates it into parameterized SQL strings. The
//! compiler supports PostgreSQL (`$1, $2, ...`) and SQLite (`?`) parameter
//! placeholder styles.
//!
//! Column references follow two conventions:
//!
//! - `relation__column` and `relation.column` both render as
//!   `"relation"."column"`, addressing a joined table by its alias.
//! - When a query has joins, bare column names are qualified with the base
//!   table so that columns present in both tables (such as `id`) are never
//!   ambiguous.

use super::expressions::Expression;
use super::lookups::{Lookup, Q};
use crate::value::Value;
use ormbook_core::{OrmError, OrmResult};

/// The type of database backend, used by the compiler to generate
/// backend-specific SQL syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackendType {
    /// PostgreSQL (uses `$1, $2, ...` placeholders).
    PostgreSQL,
    /// SQLite (uses `?` placeholders).
    SQLite,
}

/// A column ordering direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The column or annotation alias to order by.
    pub column: String,
    /// Whether to sort in descending order.
    pub descending: bool,
}

impl OrderBy {
    /// Creates an ascending order.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    /// Creates a descending order.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    /// Parses the `"-name"` shorthand: a leading `-` means descending.
    pub fn parse(spec: &str) -> Self {
        spec.strip_prefix('-')
            .map_or_else(|| Self::asc(spec), Self::desc)
    }
}

/// A column to select in a query.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    /// A column reference.
    Column(String),
    /// A column reference renamed in the result set.
    Aliased {
        /// The column reference (may point into a joined table).
        column: String,
        /// The result column name.
        alias: String,
    },
    /// An expression with an alias.
    Expression(Expression, String),
    /// All columns of the base table.
    Star,
}

/// A WHERE clause node in the query AST.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereNode {
    /// A single condition.
    Condition {
        /// The column name or annotation alias.
        column: String,
        /// The lookup type.
        lookup: Lookup,
    },
    /// Logical AND of conditions.
    And(Vec<WhereNode>),
    /// Logical OR of conditions.
    Or(Vec<WhereNode>),
    /// Logical NOT of a condition.
    Not(Box<WhereNode>),
}

impl WhereNode {
    /// Converts a `Q` object into a `WhereNode`.
    pub fn from_q(q: &Q) -> Self {
        match q {
            Q::Filter { field, lookup } => Self::Condition {
                column: field.clone(),
                lookup: lookup.clone(),
            },
            Q::And(children) => Self::And(children.iter().map(Self::from_q).collect()),
            Q::Or(children) => Self::Or(children.iter().map(Self::from_q).collect()),
            Q::Not(inner) => Self::Not(Box::new(Self::from_q(inner))),
        }
    }

    /// ANDs `other` onto an optional existing clause.
    pub fn and_with(existing: Option<Self>, other: Self) -> Self {
        match existing {
            Some(Self::And(mut children)) => {
                children.push(other);
                Self::And(children)
            }
            Some(existing) => Self::And(vec![existing, other]),
            None => other,
        }
    }
}

/// A JOIN clause in the query AST.
///
/// Renders as `<kind> "table" AS "alias" ON <left> = <right>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// The table to join.
    pub table: String,
    /// Optional alias for the joined table.
    pub alias: Option<String>,
    /// The type of join.
    pub join_type: JoinType,
    /// Left side of the ON equality (a qualified column).
    pub left: String,
    /// Right side of the ON equality (a qualified column).
    pub right: String,
}

impl Join {
    /// The name other clauses use to address this join.
    pub fn name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

/// SQL JOIN types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// INNER JOIN.
    Inner,
    /// LEFT OUTER JOIN.
    Left,
}

impl JoinType {
    /// Returns the SQL keyword for this join type.
    pub const fn sql_keyword(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// The complete query AST representing a SELECT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// The main table name.
    pub table: String,
    /// Columns to select.
    pub select: Vec<SelectColumn>,
    /// WHERE clause.
    pub where_clause: Option<WhereNode>,
    /// ORDER BY clauses.
    pub order_by: Vec<OrderBy>,
    /// GROUP BY columns.
    pub group_by: Vec<String>,
    /// HAVING clause.
    pub having: Option<WhereNode>,
    /// JOIN clauses.
    pub joins: Vec<Join>,
    /// LIMIT.
    pub limit: Option<usize>,
    /// OFFSET.
    pub offset: Option<usize>,
    /// DISTINCT flag.
    pub distinct: bool,
    /// Named annotations (computed columns), in the order they were added.
    pub annotations: Vec<(String, Expression)>,
}

impl Query {
    /// Creates a new query for the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: vec![SelectColumn::Star],
            where_clause: None,
            order_by: Vec::new(),
            group_by: Vec::new(),
            having: None,
            joins: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            annotations: Vec::new(),
        }
    }

    /// Looks up an annotation expression by alias.
    pub fn annotation(&self, alias: &str) -> Option<&Expression> {
        self.annotations
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, expr)| expr)
    }

    /// Returns `true` if a join is addressed by `name`.
    pub fn has_join(&self, name: &str) -> bool {
        self.joins.iter().any(|j| j.name() == name)
    }
}

/// A generic database row for passing data between backends and the ORM.
///
/// `Row` holds a list of column names and their corresponding values. It
/// provides typed access via the [`get`](Row::get) method.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row from column names and values.
    ///
    /// # Panics
    ///
    /// Panics if the number of columns does not match the number of values.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "Row column count must match value count"
        );
        Self { columns, values }
    }

    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a typed value by column name.
    pub fn get<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        let value = self.get_value(column).ok_or_else(|| {
            OrmError::DatabaseError(format!("Column '{column}' not found in row"))
        })?;
        T::from_value(value).map_err(|e| match e {
            OrmError::DatabaseError(msg) => {
                OrmError::DatabaseError(format!("Column '{column}': {msg}"))
            }
            other => other,
        })
    }

    /// Gets a typed value by column index.
    pub fn get_by_index<T: FromValue>(&self, idx: usize) -> OrmResult<T> {
        let value = self.values.get(idx).ok_or_else(|| {
            OrmError::DatabaseError(format!(
                "Column index {idx} out of bounds (row has {} columns)",
                self.values.len()
            ))
        })?;
        T::from_value(value)
    }

    /// Returns a reference to the raw Value at the given column name.
    pub fn get_value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Returns the columns named `prefix__<col>` as a row of `<col>` columns.
    ///
    /// Used to split a `select_related` row into the related model's row.
    pub fn related(&self, prefix: &str) -> Self {
        let marker = format!("{prefix}__");
        let (columns, values) = self
            .columns
            .iter()
            .zip(&self.values)
            .filter_map(|(col, val)| {
                col.strip_prefix(&marker)
                    .map(|stripped| (stripped.to_string(), val.clone()))
            })
            .unzip();
        Self { columns, values }
    }

    /// Converts the row into a JSON object keyed by column name.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.columns
                .iter()
                .zip(&self.values)
                .map(|(c, v)| (c.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// Trait for converting a [`Value`] to a concrete Rust type.
pub trait FromValue: Sized {
    /// Attempts to convert a value reference to this type.
    fn from_value(value: &Value) -> OrmResult<Self>;
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::Bool(b) => Ok(Self::from(*b)),
            _ => Err(OrmError::DatabaseError(format!(
                "Expected Int, got {value:?}"
            ))),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Int(i) => Self::try_from(*i).map_err(|e| {
                OrmError::DatabaseError(format!("Int value out of i32 range: {e}"))
            }),
            _ => Err(OrmError::DatabaseError(format!(
                "Expected Int, got {value:?}"
            ))),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> OrmResult<Self> {
        value.as_float().ok_or_else(|| {
            OrmError::DatabaseError(format!("Expected Float, got {value:?}"))
        })
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            // SQLite has no boolean storage class; flags come back as 0/1.
            Value::Int(i) => Ok(*i != 0),
            _ => Err(OrmError::DatabaseError(format!(
                "Expected Bool, got {value:?}"
            ))),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(OrmError::DatabaseError(format!(
                "Expected String, got {value:?}"
            ))),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> OrmResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> OrmResult<Self> {
        match value {
            Value::Null => Ok(None),
            _ => T::from_value(value).map(Some),
        }
    }
}

/// Quotes a single identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escapes `\`, `%` and `_` so a value matches literally inside a LIKE
/// pattern declared with `ESCAPE '\'`.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Splits `relation__column` or `relation.column` into its two parts.
fn split_path(name: &str) -> Option<(&str, &str)> {
    name.split_once('.')
        .or_else(|| name.split_once("__"))
        .filter(|(rel, col)| !rel.is_empty() && !col.is_empty())
}

/// Quotes a column reference. Paths become `"relation"."column"`.
pub fn quote_column(name: &str) -> String {
    if name == "*" {
        return "*".to_string();
    }
    match split_path(name) {
        Some((rel, col)) => format!("{}.{}", quote_ident(rel), quote_column(col)),
        None => quote_ident(name),
    }
}

/// Per-statement naming context.
struct Scope<'q> {
    /// Set when the statement joins other tables; bare columns get this prefix.
    qualify: Option<&'q str>,
    /// Aliases that may be referenced by name in WHERE/HAVING/ORDER BY.
    annotations: &'q [(String, Expression)],
}

impl<'q> Scope<'q> {
    const fn empty() -> Self {
        Self {
            qualify: None,
            annotations: &[],
        }
    }

    fn for_query(query: &'q Query) -> Self {
        Self {
            qualify: (!query.joins.is_empty()).then_some(query.table.as_str()),
            annotations: &query.annotations,
        }
    }

    fn annotation(&self, alias: &str) -> Option<&'q Expression> {
        self.annotations
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, expr)| expr)
    }

    fn column(&self, name: &str) -> String {
        match self.qualify {
            Some(table)
                if name != "*" && split_path(name).is_none() && self.annotation(name).is_none() =>
            {
                format!("{}.{}", quote_ident(table), quote_ident(name))
            }
            _ => quote_column(name),
        }
    }
}

/// The SQL compiler translates a [`Query`] AST into parameterized SQL.
///
/// Different backends use different placeholder styles:
/// - PostgreSQL: `$1, $2, $3, ...`
/// - SQLite: `?, ?, ?, ...`
#[derive(Debug, Clone, Copy)]
pub struct SqlCompiler {
    backend: DatabaseBackendType,
}

impl SqlCompiler {
    /// Creates a new compiler for the given backend type.
    pub const fn new(backend: DatabaseBackendType) -> Self {
        Self { backend }
    }

    /// The dialect this compiler targets.
    pub const fn backend(&self) -> DatabaseBackendType {
        self.backend
    }

    /// Returns a parameter placeholder for the given 1-based index.
    fn placeholder(&self, index: usize) -> String {
        match self.backend {
            DatabaseBackendType::PostgreSQL => format!("${index}"),
            DatabaseBackendType::SQLite => "?".to_string(),
        }
    }

    /// Pushes a parameter and returns its placeholder.
    fn bind(&self, value: Value, params: &mut Vec<Value>) -> String {
        params.push(value);
        self.placeholder(params.len())
    }

    /// Compiles a SELECT query into SQL and parameters.
    pub fn compile_select(&self, query: &Query) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.compile_select_into(query, &mut params);
        (sql, params)
    }

    /// Compiles a SELECT, continuing the numbering of `params`.
    ///
    /// Subqueries go through here so their placeholders line up with the
    /// enclosing statement's.
    fn compile_select_into(&self, query: &Query, params: &mut Vec<Value>) -> String {
        let scope = Scope::for_query(query);
        let mut sql = String::from("SELECT ");

        if query.distinct {
            sql.push_str("DISTINCT ");
        }

        let star = || {
            if query.joins.is_empty() {
                "*".to_string()
            } else {
                format!("{}.*", quote_ident(&query.table))
            }
        };

        let mut select_parts: Vec<String> = Vec::new();
        if query.select.is_empty() && query.annotations.is_empty() {
            select_parts.push(star());
        }
        for col in &query.select {
            let part = match col {
                SelectColumn::Column(name) => scope.column(name),
                SelectColumn::Aliased { column, alias } => {
                    format!("{} AS {}", scope.column(column), quote_ident(alias))
                }
                SelectColumn::Expression(expr, alias) => {
                    let expr_sql = self.compile_expression(expr, &scope, params);
                    format!("{expr_sql} AS {}", quote_ident(alias))
                }
                SelectColumn::Star => star(),
            };
            select_parts.push(part);
        }
        for (alias, expr) in &query.annotations {
            let expr_sql = self.compile_expression(expr, &scope, params);
            select_parts.push(format!("{expr_sql} AS {}", quote_ident(alias)));
        }
        sql.push_str(&select_parts.join(", "));

        // FROM
        sql.push_str(&format!(" FROM {}", quote_ident(&query.table)));

        // JOINs
        for join in &query.joins {
            sql.push_str(&format!(
                " {} {}",
                join.join_type.sql_keyword(),
                quote_ident(&join.table)
            ));
            if let Some(alias) = &join.alias {
                sql.push_str(&format!(" AS {}", quote_ident(alias)));
            }
            sql.push_str(&format!(
                " ON {} = {}",
                quote_column(&join.left),
                quote_column(&join.right)
            ));
        }

        // WHERE
        if let Some(ref where_clause) = query.where_clause {
            sql.push_str(" WHERE ");
            self.compile_where_node(where_clause, &scope, &mut sql, params);
        }

        // GROUP BY
        if !query.group_by.is_empty() {
            let cols: Vec<String> = query.group_by.iter().map(|c| scope.column(c)).collect();
            sql.push_str(&format!(" GROUP BY {}", cols.join(", ")));
        }

        // HAVING
        if let Some(ref having) = query.having {
            sql.push_str(" HAVING ");
            self.compile_where_node(having, &scope, &mut sql, params);
        }

        // ORDER BY
        if !query.order_by.is_empty() {
            let orders: Vec<String> = query
                .order_by
                .iter()
                .map(|o| {
                    let dir = if o.descending { " DESC" } else { " ASC" };
                    format!("{}{dir}", scope.column(&o.column))
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }

        // LIMIT / OFFSET
        match (query.limit, query.offset) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {limit}")),
            // SQLite only accepts OFFSET after a LIMIT clause.
            (None, Some(_)) if self.backend == DatabaseBackendType::SQLite => {
                sql.push_str(" LIMIT -1");
            }
            (None, _) => {}
        }
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        sql
    }

    /// Compiles an INSERT statement.
    pub fn compile_insert(&self, table: &str, fields: &[(&str, Value)]) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        if fields.is_empty() {
            return (
                format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table)),
                params,
            );
        }
        let columns: Vec<String> = fields.iter().map(|(name, _)| quote_ident(name)).collect();
        let placeholders: Vec<String> = fields
            .iter()
            .map(|(_, val)| self.bind(val.clone(), &mut params))
            .collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.join(", "),
            placeholders.join(", ")
        );

        (sql, params)
    }

    /// Compiles an UPDATE statement.
    pub fn compile_update(
        &self,
        table: &str,
        fields: &[(&str, Value)],
        where_clause: &WhereNode,
    ) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let set_parts: Vec<String> = fields
            .iter()
            .map(|(name, val)| {
                let ph = self.bind(val.clone(), &mut params);
                format!("{} = {ph}", quote_ident(name))
            })
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {} WHERE ",
            quote_ident(table),
            set_parts.join(", ")
        );

        self.compile_where_node(where_clause, &Scope::empty(), &mut sql, &mut params);

        (sql, params)
    }

    /// Compiles a DELETE statement.
    pub fn compile_delete(&self, table: &str, where_clause: &WhereNode) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {} WHERE ", quote_ident(table));
        self.compile_where_node(where_clause, &Scope::empty(), &mut sql, &mut params);
        (sql, params)
    }

    /// Compiles a `WhereNode` into SQL, appending to the provided string.
    ///
    /// A condition on an annotation alias renders the annotation's expression
    /// in place of the alias.
    fn compile_where_node(
        &self,
        node: &WhereNode,
        scope: &Scope<'_>,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) {
        match node {
            WhereNode::Condition { column, lookup } => {
                let lhs = match scope.annotation(column) {
                    Some(expr) => self.compile_expression(expr, scope, params),
                    None => scope.column(column),
                };
                self.compile_lookup(&lhs, lookup, sql, params);
            }
            WhereNode::And(children) => {
                if children.is_empty() {
                    sql.push_str("1=1");
                    return;
                }
                sql.push('(');
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(" AND ");
                    }
                    self.compile_where_node(child, scope, sql, params);
                }
                sql.push(')');
            }
            WhereNode::Or(children) => {
                if children.is_empty() {
                    sql.push_str("1=0");
                    return;
                }
                sql.push('(');
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(" OR ");
                    }
                    self.compile_where_node(child, scope, sql, params);
                }
                sql.push(')');
            }
            WhereNode::Not(inner) => {
                sql.push_str("NOT (");
                self.compile_where_node(inner, scope, sql, params);
                sql.push(')');
            }
        }
    }

    /// Binds a LIKE pattern with `value` escaped and the given wildcards
    /// around it, and renders the comparison.
    fn like(
        &self,
        lhs: &str,
        value: &str,
        (prefix, suffix): (&str, &str),
        case_insensitive: bool,
        params: &mut Vec<Value>,
    ) -> String {
        let pattern = format!("{prefix}{}{suffix}", escape_like(value));
        let ph = self.bind(Value::String(pattern), params);
        match (case_insensitive, self.backend) {
            (false, _) => format!("{lhs} LIKE {ph} ESCAPE '\\'"),
            (true, DatabaseBackendType::PostgreSQL) => format!("{lhs} ILIKE {ph} ESCAPE '\\'"),
            (true, DatabaseBackendType::SQLite) => {
                format!("LOWER({lhs}) LIKE LOWER({ph}) ESCAPE '\\'")
            }
        }
    }

    /// Compiles a single lookup against an already-rendered left-hand side.
    fn compile_lookup(&self, lhs: &str, lookup: &Lookup, sql: &mut String, params: &mut Vec<Value>) {
        let fragment = match lookup {
            Lookup::Exact(val) if val.is_null() => format!("{lhs} IS NULL"),
            Lookup::Exact(val) => format!("{lhs} = {}", self.bind(val.clone(), params)),
            Lookup::IExact(val) => {
                let ph = self.bind(val.clone(), params);
                format!("LOWER({lhs}) = LOWER({ph})")
            }
            Lookup::Contains(val) => self.like(lhs, val, ("%", "%"), false, params),
            Lookup::IContains(val) => self.like(lhs, val, ("%", "%"), true, params),
            Lookup::In(vals) if vals.is_empty() => "1=0".to_string(),
            Lookup::In(vals) => {
                let placeholders: Vec<String> =
                    vals.iter().map(|v| self.bind(v.clone(), params)).collect();
                format!("{lhs} IN ({})", placeholders.join(", "))
            }
            Lookup::InQuery(query) => {
                let sub_sql = self.compile_select_into(query, params);
                format!("{lhs} IN ({sub_sql})")
            }
            Lookup::Gt(val) => format!("{lhs} > {}", self.bind(val.clone(), params)),
            Lookup::Gte(val) => format!("{lhs} >= {}", self.bind(val.clone(), params)),
            Lookup::Lt(val) => format!("{lhs} < {}", self.bind(val.clone(), params)),
            Lookup::Lte(val) => format!("{lhs} <= {}", self.bind(val.clone(), params)),
            Lookup::StartsWith(val) => self.like(lhs, val, ("", "%"), false, params),
            Lookup::IStartsWith(val) => self.like(lhs, val, ("", "%"), true, params),
            Lookup::EndsWith(val) => self.like(lhs, val, ("%", ""), false, params),
            Lookup::IEndsWith(val) => self.like(lhs, val, ("%", ""), true, params),
            Lookup::Range(low, high) => {
                let ph_low = self.bind(low.clone(), params);
                let ph_high = self.bind(high.clone(), params);
                format!("{lhs} BETWEEN {ph_low} AND {ph_high}")
            }
            Lookup::IsNull(true) => format!("{lhs} IS NULL"),
            Lookup::IsNull(false) => format!("{lhs} IS NOT NULL"),
        };
        sql.push_str(&fragment);
    }

    /// Compiles an expression into SQL.
    fn compile_expression(
        &self,
        expr: &Expression,
        scope: &Scope<'_>,
        params: &mut Vec<Value>,
    ) -> String {
        match expr {
            Expression::Col(name) | Expression::F(name) => scope.column(name),
            Expression::Value(val) => self.bind(val.clone(), params),
            Expression::Func { name, args } => {
                let arg_parts: Vec<String> = args
                    .iter()
                    .map(|a| self.compile_expression(a, scope, params))
                    .collect();
                format!("{name}({})", arg_parts.join(", "))
            }
            Expression::Aggregate {
                func,
                field,
                distinct,
            } => {
                let field_sql = self.compile_expression(field, scope, params);
                let distinct_str = if *distinct { "DISTINCT " } else { "" };
                format!("{}({distinct_str}{field_sql})", func.sql_name())
            }
            Expression::Subquery(query) => {
                let sub_sql = self.compile_select_into(query, params);
                format!("({sub_sql})")
            }
            Expression::RawSQL(raw, raw_params) => {
                params.extend(raw_params.iter().cloned());
                raw.clone()
            }
            Expression::Add(left, right) => self.binary(left, "+", right, scope, params),
            Expression::Sub(left, right) => self.binary(left, "-", right, scope, params),
            Expression::Mul(left, right) => self.binary(left, "*", right, scope, params),
            Expression::Div(left, right) => self.binary(left, "/", right, scope, params),
        }
    }

    fn binary(
        &self,
        left: &Expression,
        op: &str,
        right: &Expression,
        scope: &Scope<'_>,
        params: &mut Vec<Value>,
    ) -> String {
        let l = self.compile_expression(left, scope, params);
        let r = self.compile_expression(right, scope, params);
        format!("({l} {op} {r})")
    }
}
