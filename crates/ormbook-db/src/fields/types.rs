//! Field type definitions for the ORM.
//!
//! Each [`FieldType`] variant determines a column's SQL type, and
//! [`FieldDef`] captures the metadata the schema editor and field validation
//! need about a single model field.

use std::sync::LazyLock;

use ormbook_core::ValidationError;
use regex::Regex;

use crate::value::Value;

static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").ok());

/// The type of a model field, determining its SQL column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Auto-incrementing 32-bit integer primary key.
    AutoField,
    /// Auto-incrementing 64-bit integer primary key.
    BigAutoField,
    /// Variable-length string with a max length.
    CharField,
    /// Unlimited-length text.
    TextField,
    /// Email address (a `CharField` holding `local@domain.tld`).
    EmailField,
    /// 32-bit signed integer.
    IntegerField,
    /// 64-bit signed integer.
    BigIntegerField,
    /// Boolean (true/false).
    BooleanField,
    /// 64-bit floating-point number.
    FloatField,
    /// Date without time.
    DateField,
    /// Date and time.
    DateTimeField,
    /// Many-to-one relationship.
    ForeignKey {
        /// The referenced table.
        to: &'static str,
        /// Behavior when the referenced row is deleted.
        on_delete: OnDelete,
    },
    /// One-to-one relationship (unique foreign key).
    OneToOneField {
        /// The referenced table.
        to: &'static str,
        /// Behavior when the referenced row is deleted.
        on_delete: OnDelete,
    },
}

/// Behavior when a referenced row is deleted (ON DELETE action).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    /// Delete all related rows.
    Cascade,
    /// Prevent deletion if related rows exist.
    Protect,
    /// Set the foreign key to NULL.
    SetNull,
    /// Take no action (may cause integrity errors).
    DoNothing,
}

impl OnDelete {
    /// Returns the SQL keyword for this action.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::Protect => "RESTRICT",
            Self::SetNull => "SET NULL",
            Self::DoNothing => "NO ACTION",
        }
    }
}

/// Complete definition of a model field.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// The attribute name of this field.
    pub name: &'static str,
    /// The database column name (may differ from `name`).
    pub column: String,
    /// The type of this field.
    pub field_type: FieldType,
    /// Whether this field is the primary key.
    pub primary_key: bool,
    /// Whether NULL is allowed in the database.
    pub null: bool,
    /// Default value for new rows.
    pub default: Option<Value>,
    /// Whether a UNIQUE constraint is applied.
    pub unique: bool,
    /// Maximum character length (for `CharField` and similar).
    pub max_length: Option<usize>,
}

impl FieldDef {
    /// Creates a new `FieldDef` with non-null, non-unique defaults.
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            column: name.to_string(),
            field_type,
            primary_key: false,
            null: false,
            default: None,
            unique: false,
            max_length: None,
        }
    }

    /// Sets the database column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Marks this field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Allows NULL values in the database.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    /// Sets the maximum character length.
    #[must_use]
    pub const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Marks this field as having a UNIQUE constraint.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the default value for this field.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Returns `true` if this field references another table.
    pub const fn is_relation(&self) -> bool {
        matches!(
            self.field_type,
            FieldType::ForeignKey { .. } | FieldType::OneToOneField { .. }
        )
    }

    /// Checks a value against this field's null and length constraints.
    ///
    /// The database still enforces UNIQUE and FOREIGN KEY; this only catches
    /// what can be known without a round trip.
    pub fn clean(&self, value: &Value) -> Result<(), ValidationError> {
        if value.is_null() {
            if self.null || self.primary_key || self.default.is_some() {
                return Ok(());
            }
            return Err(ValidationError::new("This field cannot be null.", "null"));
        }

        if let (Some(limit), Value::String(s)) = (self.max_length, value) {
            let len = s.chars().count();
            if len > limit {
                return Err(ValidationError::new(
                    format!(
                        "Ensure this value has at most {limit} characters (it has {len})."
                    ),
                    "max_length",
                )
                .with_param("limit", limit.to_string()));
            }
        }

        if self.field_type == FieldType::EmailField {
            if let Value::String(s) = value {
                if !EMAIL_RE.as_ref().is_some_and(|re| re.is_match(s)) {
                    return Err(ValidationError::new(
                        "Enter a valid email address.",
                        "invalid",
                    ));
                }
            }
        }

        Ok(())
    }
}
