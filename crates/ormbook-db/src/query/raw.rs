//! Raw SQL query support.
//!
//! [`RawQuerySet`] runs a hand-written SELECT and maps its rows to model
//! instances; [`RawSql`] runs any statement and hands back plain rows or an
//! affected-row count.
//!
//! Values always travel as bound parameters. Before anything is sent, the SQL
//! is screened by [`validate_raw_sql`] and its placeholders are counted
//! against the parameters supplied.

use crate::executor::DbExecutor;
use crate::model::Model;
use crate::query::compiler::{DatabaseBackendType, Row};
use crate::value::Value;
use ormbook_core::{OrmError, OrmResult};
use std::marker::PhantomData;

/// A raw SQL query that returns model instances.
///
/// Placeholders follow the backend: `?` for SQLite, `$1, $2, ...` for
/// PostgreSQL.
pub struct RawQuerySet<M: Model> {
    sql: String,
    params: Vec<Value>,
    /// Column renames applied before `M::from_row`, as (sql column, field).
    translations: Vec<(String, String)>,
    _phantom: PhantomData<M>,
}

impl<M: Model> RawQuerySet<M> {
    /// Creates a new raw query set.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
            translations: Vec::new(),
            _phantom: PhantomData,
        }
    }

    /// Adds column-to-field name translations.
    ///
    /// Use this when the raw SQL column names don't match the model field
    /// names. Each pair is (sql_column_name, model_field_name).
    #[must_use]
    pub fn translate(mut self, translations: &[(&str, &str)]) -> Self {
        self.translations = translations
            .iter()
            .map(|(from, to)| ((*from).to_string(), (*to).to_string()))
            .collect();
        self
    }

    /// Returns the SQL query string.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the query parameters.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Executes the raw query and returns model instances.
    pub async fn execute(&self, db: &dyn DbExecutor) -> OrmResult<Vec<M>> {
        check_statement(&self.sql, &self.params, db.backend_type())?;
        let rows = db.query(&self.sql, &self.params).await?;
        rows.iter().map(|row| self.to_model(row)).collect()
    }

    /// Executes the raw query and returns the first model instance, or None.
    pub async fn first(&self, db: &dyn DbExecutor) -> OrmResult<Option<M>> {
        check_statement(&self.sql, &self.params, db.backend_type())?;
        let rows = db.query(&self.sql, &self.params).await?;
        rows.first().map(|row| self.to_model(row)).transpose()
    }

    fn to_model(&self, row: &Row) -> OrmResult<M> {
        if self.translations.is_empty() {
            return M::from_row(row);
        }
        let columns = row
            .columns()
            .iter()
            .map(|col| {
                self.translations
                    .iter()
                    .find(|(from, _)| from == col)
                    .map_or_else(|| col.clone(), |(_, to)| to.clone())
            })
            .collect();
        M::from_row(&Row::new(columns, row.values().to_vec()))
    }
}

/// A direct SQL statement for queries that don't map to models.
#[derive(Debug, Clone)]
pub struct RawSql {
    sql: String,
    params: Vec<Value>,
}

impl RawSql {
    /// Creates a new raw SQL statement.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Returns the SQL string.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the query parameters.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Runs the SQL and returns all result rows.
    pub async fn fetch_all(&self, db: &dyn DbExecutor) -> OrmResult<Vec<Row>> {
        check_statement(&self.sql, &self.params, db.backend_type())?;
        db.query(&self.sql, &self.params).await
    }

    /// Runs the SQL and returns the first row, or None.
    pub async fn fetch_one(&self, db: &dyn DbExecutor) -> OrmResult<Option<Row>> {
        let rows = self.fetch_all(db).await?;
        Ok(rows.into_iter().next())
    }

    /// Runs the SQL as a statement and returns the number of affected rows.
    pub async fn execute(&self, db: &dyn DbExecutor) -> OrmResult<u64> {
        check_statement(&self.sql, &self.params, db.backend_type())?;
        db.execute_sql(&self.sql, &self.params).await
    }
}

/// Rejects SQL that looks like it was assembled by string interpolation.
///
/// This is a heuristic: a quote followed by `;` means a literal was closed
/// and a second statement opened, which parameterized SQL never needs.
pub fn validate_raw_sql(sql: &str) -> OrmResult<()> {
    if sql.contains("'; ") || sql.contains("\"; ") || sql.contains("';--") {
        return Err(OrmError::SuspiciousOperation(
            "Raw SQL query contains patterns that may indicate SQL injection. \
             Use parameterized queries instead of string interpolation."
                .to_string(),
        ));
    }
    Ok(())
}

/// Counts the parameters `sql` binds, ignoring quoted literals and comments.
///
/// SQLite numbers its parameters the way the driver does: a bare `?` takes
/// the next index after the highest seen so far, `?NNN` takes index `NNN`,
/// and each distinct `:name`, `@name` or `$name` takes the next index once.
/// PostgreSQL takes the highest `$n`.
pub fn placeholder_count(sql: &str, backend: DatabaseBackendType) -> usize {
    let sqlite = backend == DatabaseBackendType::SQLite;
    let mut highest = 0;
    let mut names: Vec<String> = Vec::new();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '-') if chars.peek() == Some(&'-') => {
                while chars.next_if(|&n| n != '\n').is_some() {}
            }
            (None, '/') if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
            }
            (None, '?') => match take_digits(&mut chars) {
                Some(n) => highest = highest.max(n),
                None => highest += 1,
            },
            (None, '$') if !sqlite => {
                if let Some(n) = take_digits(&mut chars) {
                    highest = highest.max(n);
                }
            }
            (None, ':' | '@' | '$') if sqlite => {
                let mut name = String::from(c);
                while let Some(n) = chars.next_if(|&n| n.is_ascii_alphanumeric() || n == '_') {
                    name.push(n);
                }
                if name.len() > 1 && !names.contains(&name) {
                    names.push(name);
                    highest += 1;
                }
            }
            (None, _) => {}
        }
    }
    highest
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut digits = String::new();
    while let Some(d) = chars.next_if(char::is_ascii_digit) {
        digits.push(d);
    }
    digits.parse().ok()
}

fn check_statement(sql: &str, params: &[Value], backend: DatabaseBackendType) -> OrmResult<()> {
    validate_raw_sql(sql)?;
    let expected = placeholder_count(sql, backend);
    if expected != params.len() {
        return Err(OrmError::DatabaseError(format!(
            "Raw SQL expects {expected} parameter(s) but {} were supplied",
            params.len()
        )));
    }
    Ok(())
}
