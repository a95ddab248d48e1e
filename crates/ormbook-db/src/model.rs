//! Model trait and metadata for the ORM.
//!
//! The [`Model`] trait is the core abstraction that all ORM models implement.
//! It provides access to metadata, field values, and construction from database
//! rows. [`ModelMeta`] describes the table: its name, default ordering, and
//! field definitions. [`Relation`] describes a one-to-one or many-to-one link
//! that queries can join through using `relation__column` paths.

use crate::fields::FieldDef;
use crate::query::compiler::{Join, JoinType, OrderBy};
use crate::value::Value;
use ormbook_core::{OrmError, OrmResult, ValidationError};
use std::collections::HashMap;

pub use crate::query::compiler::Row;

/// The core trait for all ORM models.
///
/// # Examples
///
/// ```
/// use ormbook_db::model::{Model, ModelMeta};
/// use ormbook_db::fields::{FieldDef, FieldType};
/// use ormbook_db::value::Value;
/// use ormbook_db::query::compiler::Row;
/// use ormbook_core::OrmResult;
///
/// struct Tag {
///     id: Option<i64>,
///     label: String,
/// }
///
/// impl Model for Tag {
///     fn meta() -> &'static ModelMeta {
///         use std::sync::LazyLock;
///         static META: LazyLock<ModelMeta> = LazyLock::new(|| ModelMeta {
///             model_name: "tag",
///             db_table: "tags",
///             ordering: vec![],
///             fields: vec![
///                 FieldDef::new("id", FieldType::AutoField).primary_key(),
///                 FieldDef::new("label", FieldType::CharField).max_length(30),
///             ],
///         });
///         &META
///     }
///
///     fn pk(&self) -> Option<Value> { self.id.map(Value::Int) }
///     fn set_pk(&mut self, value: Value) { self.id = value.as_int(); }
///     fn field_values(&self) -> Vec<(&'static str, Value)> {
///         vec![("id", self.id.into()), ("label", self.label.clone().into())]
///     }
///     fn from_row(row: &Row) -> OrmResult<Self> {
///         Ok(Tag { id: row.get("id")?, label: row.get("label")? })
///     }
/// }
///
/// assert_eq!(Tag::table_name(), "tags");
/// ```
pub trait Model: Send + Sync + 'static {
    /// Returns the static metadata for this model type.
    fn meta() -> &'static ModelMeta;

    /// Returns the database table name.
    fn table_name() -> &'static str {
        Self::meta().db_table
    }

    /// Returns the primary key value, or `None` if the instance is unsaved.
    fn pk(&self) -> Option<Value>;

    /// Sets the primary key value on this instance (used after INSERT).
    fn set_pk(&mut self, value: Value);

    /// Returns the name of the primary key field.
    fn pk_field_name() -> &'static str {
        "id"
    }

    /// Returns all field name-value pairs for this instance.
    fn field_values(&self) -> Vec<(&'static str, Value)>;

    /// Returns field name-value pairs excluding the primary key.
    fn non_pk_field_values(&self) -> Vec<(&'static str, Value)> {
        let pk_name = Self::pk_field_name();
        self.field_values()
            .into_iter()
            .filter(|(name, _)| *name != pk_name)
            .collect()
    }

    /// Constructs a model instance from a database row.
    fn from_row(row: &Row) -> OrmResult<Self>
    where
        Self: Sized;

    /// Looks up a relation by the name used in `relation__column` paths.
    fn relation(_name: &str) -> Option<Relation> {
        None
    }

    /// Checks every non-pk field value against its [`FieldDef`].
    ///
    /// Errors are collected per field into a single
    /// [`OrmError::ValidationError`].
    fn clean_fields(&self) -> OrmResult<()> {
        let meta = Self::meta();
        let mut errors: HashMap<String, Vec<ValidationError>> = HashMap::new();
        for (name, value) in self.non_pk_field_values() {
            if let Some(field) = meta.field(name) {
                if let Err(e) = field.clean(&value) {
                    errors.entry(name.to_string()).or_default().push(e);
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(OrmError::ValidationError(
                ValidationError::with_field_errors(errors),
            ))
        }
    }
}

/// Metadata about a model.
#[derive(Debug)]
pub struct ModelMeta {
    /// The model name in lowercase (e.g., "user").
    pub model_name: &'static str,
    /// The database table name.
    pub db_table: &'static str,
    /// Default ordering for queries.
    pub ordering: Vec<OrderBy>,
    /// Field definitions, in column order.
    pub fields: Vec<FieldDef>,
}

impl ModelMeta {
    /// Finds a field definition by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Column names in definition order.
    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.column.as_str()).collect()
    }
}

/// A link from one model's table to another that queries can join through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// The name used in `relation__column` paths and as the join alias.
    pub name: &'static str,
    /// The related table.
    pub table: &'static str,
    /// The column on the owning model's table.
    pub local_column: &'static str,
    /// The column on the related table.
    pub remote_column: &'static str,
    /// Columns of the related table, selected by `select_related`.
    pub columns: &'static [&'static str],
}

impl Relation {
    /// Builds the JOIN clause that attaches this relation to `owner_table`.
    pub fn join(&self, owner_table: &str, join_type: JoinType) -> Join {
        Join {
            table: self.table.to_string(),
            alias: Some(self.name.to_string()),
            join_type,
            left: format!("{}.{}", self.name, self.remote_column),
            right: format!("{owner_table}.{}", self.local_column),
        }
    }
}
