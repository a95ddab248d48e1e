//! DDL generation from model metadata.
//!
//! [`SchemaEditor`] turns a [`ModelMeta`] into `CREATE TABLE` statements for
//! the target dialect and can apply them through a [`DbExecutor`]. There is
//! no migration history: tables are created if missing and dropped on
//! request.

use crate::executor::DbExecutor;
use crate::fields::{FieldDef, FieldType};
use crate::model::ModelMeta;
use crate::query::compiler::{quote_ident, DatabaseBackendType};
use crate::value::Value;
use ormbook_core::OrmResult;

/// Generates and applies DDL for one backend dialect.
#[derive(Debug, Clone, Copy)]
pub struct SchemaEditor {
    backend: DatabaseBackendType,
}

impl SchemaEditor {
    /// Creates an editor for the given dialect.
    pub const fn new(backend: DatabaseBackendType) -> Self {
        Self { backend }
    }

    /// `CREATE TABLE IF NOT EXISTS` for the model, with column constraints
    /// followed by table-level FOREIGN KEY clauses.
    pub fn create_table_sql(&self, meta: &ModelMeta) -> String {
        let mut parts: Vec<String> = meta
            .fields
            .iter()
            .map(|field| format!("{} {}", quote_ident(&field.column), self.column_sql(field)))
            .collect();

        for field in &meta.fields {
            if let FieldType::ForeignKey { to, on_delete }
            | FieldType::OneToOneField { to, on_delete } = field.field_type
            {
                parts.push(format!(
                    "FOREIGN KEY ({}) REFERENCES {} (\"id\") ON DELETE {}",
                    quote_ident(&field.column),
                    quote_ident(to),
                    on_delete.as_sql()
                ));
            }
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(meta.db_table),
            parts.join(", ")
        )
    }

    /// `DROP TABLE IF EXISTS` for the model.
    pub fn drop_table_sql(&self, meta: &ModelMeta) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_ident(meta.db_table))
    }

    /// Creates every table in order. Referenced tables must come first.
    pub async fn create_tables(&self, db: &dyn DbExecutor, metas: &[&ModelMeta]) -> OrmResult<()> {
        for meta in metas {
            let sql = self.create_table_sql(meta);
            db.execute_sql(&sql, &[]).await?;
            tracing::debug!(table = meta.db_table, "table created");
        }
        Ok(())
    }

    /// Drops every table in reverse order, so referencing tables go first.
    pub async fn drop_tables(&self, db: &dyn DbExecutor, metas: &[&ModelMeta]) -> OrmResult<()> {
        for meta in metas.iter().rev() {
            db.execute_sql(&self.drop_table_sql(meta), &[]).await?;
        }
        Ok(())
    }

    /// The type and constraints following a column name.
    fn column_sql(&self, field: &FieldDef) -> String {
        let auto = matches!(
            field.field_type,
            FieldType::AutoField | FieldType::BigAutoField
        );
        let mut sql = self.type_sql(field);

        if field.primary_key {
            sql.push_str(" PRIMARY KEY");
            if auto && self.backend == DatabaseBackendType::SQLite {
                sql.push_str(" AUTOINCREMENT");
            }
            return sql;
        }

        if !field.null {
            sql.push_str(" NOT NULL");
        }
        if field.unique || matches!(field.field_type, FieldType::OneToOneField { .. }) {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = default_sql(field.default.as_ref()) {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default);
        }
        sql
    }

    fn type_sql(&self, field: &FieldDef) -> String {
        match self.backend {
            DatabaseBackendType::SQLite => sqlite_type_sql(&field.field_type).to_string(),
            DatabaseBackendType::PostgreSQL => pg_type_sql(&field.field_type, field.max_length),
        }
    }
}

/// Renders a literal default value, or `None` when there is nothing to emit.
fn default_sql(default: Option<&Value>) -> Option<String> {
    match default? {
        Value::Null => Some("NULL".to_string()),
        Value::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Value::Int(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        _ => None,
    }
}

fn sqlite_type_sql(field_type: &FieldType) -> &'static str {
    match field_type {
        FieldType::AutoField
        | FieldType::BigAutoField
        | FieldType::IntegerField
        | FieldType::BigIntegerField
        | FieldType::BooleanField
        | FieldType::ForeignKey { .. }
        | FieldType::OneToOneField { .. } => "INTEGER",
        FieldType::CharField
        | FieldType::TextField
        | FieldType::EmailField
        | FieldType::DateField
        | FieldType::DateTimeField => "TEXT",
        FieldType::FloatField => "REAL",
    }
}

fn pg_type_sql(field_type: &FieldType, max_length: Option<usize>) -> String {
    match field_type {
        FieldType::AutoField => "SERIAL".to_string(),
        FieldType::BigAutoField => "BIGSERIAL".to_string(),
        FieldType::CharField | FieldType::EmailField => {
            format!("VARCHAR({})", max_length.unwrap_or(255))
        }
        FieldType::TextField => "TEXT".to_string(),
        FieldType::IntegerField => "INTEGER".to_string(),
        FieldType::BigIntegerField | FieldType::ForeignKey { .. } | FieldType::OneToOneField { .. } => {
            "BIGINT".to_string()
        }
        FieldType::FloatField => "DOUBLE PRECISION".to_string(),
        FieldType::BooleanField => "BOOLEAN".to_string(),
        FieldType::DateField => "DATE".to_string(),
        FieldType::DateTimeField => "TIMESTAMP".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::OnDelete;

    fn authors() -> ModelMeta {
        ModelMeta {
            model_name: "author",
            db_table: "authors",
            ordering: vec![],
            fields: vec![
                FieldDef::new("id", FieldType::AutoField).primary_key(),
                FieldDef::new("name", FieldType::CharField).max_length(100),
                FieldDef::new("email", FieldType::EmailField).unique(),
                FieldDef::new("is_active", FieldType::BooleanField).default(true),
                FieldDef::new("rank", FieldType::CharField)
                    .max_length(10)
                    .default("o'neil"),
                FieldDef::new("bio", FieldType::TextField).nullable(),
            ],
        }
    }

    fn bios() -> ModelMeta {
        ModelMeta {
            model_name: "bio",
            db_table: "bios",
            ordering: vec![],
            fields: vec![
                FieldDef::new("id", FieldType::AutoField).primary_key(),
                FieldDef::new(
                    "author_id",
                    FieldType::OneToOneField {
                        to: "authors",
                        on_delete: OnDelete::Cascade,
                    },
                ),
            ],
        }
    }

    #[test]
    fn test_sqlite_create_table() {
        let sql = SchemaEditor::new(DatabaseBackendType::SQLite).create_table_sql(&authors());
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"authors\" (\
             \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"name\" TEXT NOT NULL, \
             \"email\" TEXT NOT NULL UNIQUE, \
             \"is_active\" INTEGER NOT NULL DEFAULT TRUE, \
             \"rank\" TEXT NOT NULL DEFAULT 'o''neil', \
             \"bio\" TEXT)"
        );
    }

    #[test]
    fn test_sqlite_one_to_one_is_unique_with_fk() {
        let sql = SchemaEditor::new(DatabaseBackendType::SQLite).create_table_sql(&bios());
        assert!(sql.contains("\"author_id\" INTEGER NOT NULL UNIQUE"));
        assert!(sql.ends_with(
            "FOREIGN KEY (\"author_id\") REFERENCES \"authors\" (\"id\") ON DELETE CASCADE)"
        ));
    }

    #[test]
    fn test_postgres_types() {
        let sql = SchemaEditor::new(DatabaseBackendType::PostgreSQL).create_table_sql(&authors());
        assert!(sql.contains("\"id\" SERIAL PRIMARY KEY,"));
        assert!(sql.contains("\"name\" VARCHAR(100) NOT NULL"));
        assert!(sql.contains("\"email\" VARCHAR(255) NOT NULL UNIQUE"));
        assert!(sql.contains("\"is_active\" BOOLEAN NOT NULL DEFAULT TRUE"));
        assert!(!sql.contains("AUTOINCREMENT"));
    }

    #[test]
    fn test_drop_table() {
        let sql = SchemaEditor::new(DatabaseBackendType::SQLite).drop_table_sql(&bios());
        assert_eq!(sql, "DROP TABLE IF EXISTS \"bios\"");
    }

    #[test]
    fn test_default_sql() {
        assert_eq!(default_sql(None), None);
        assert_eq!(default_sql(Some(&Value::Int(5))).as_deref(), Some("5"));
        assert_eq!(default_sql(Some(&Value::Bool(false))).as_deref(), Some("FALSE"));
        assert_eq!(default_sql(Some(&Value::Bytes(vec![1]))), None);
    }
}
