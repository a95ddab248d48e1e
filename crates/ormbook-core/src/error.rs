//! Core error types for ormbook.
//!
//! [`OrmError`] covers ORM lookups, database failures, configuration problems,
//! validation, serialization, and IO. Backends translate their driver errors
//! into these variants so callers can match on the failure category (for
//! instance, rolling back only on [`OrmError::IntegrityError`]).

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Represents a validation error with optional field-level errors.
///
/// # Examples
///
/// ```
/// use ormbook_core::error::ValidationError;
///
/// let err = ValidationError::new("Ensure this value has at most 100 characters.", "max_length")
///     .with_param("limit", "100");
/// assert_eq!(err.code, "max_length");
/// ```
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The primary error message.
    pub message: String,
    /// A short code identifying the type of validation failure (e.g. "required", "invalid").
    pub code: String,
    /// Additional parameters providing context for the error message.
    pub params: HashMap<String, String>,
    /// Per-field validation errors, keyed by field name.
    pub field_errors: HashMap<String, Vec<Self>>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            params: HashMap::new(),
            field_errors: HashMap::new(),
        }
    }

    /// Creates a `ValidationError` containing per-field errors.
    pub fn with_field_errors(field_errors: HashMap<String, Vec<Self>>) -> Self {
        Self {
            message: String::new(),
            code: String::new(),
            params: HashMap::new(),
            field_errors,
        }
    }

    /// Adds a parameter to this validation error.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            write!(f, "{}", self.message)?;
        } else if !self.field_errors.is_empty() {
            let mut fields: Vec<_> = self.field_errors.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            let mut first = true;
            for (field, errors) in fields {
                for error in errors {
                    if !first {
                        write!(f, "; ")?;
                    }
                    write!(f, "{field}: {error}")?;
                    first = false;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for ormbook.
#[derive(Error, Debug)]
pub enum OrmError {
    // ── ORM errors ───────────────────────────────────────────────────

    /// A query expected exactly one result but found none.
    #[error("Object does not exist: {0}")]
    DoesNotExist(String),

    /// A query expected exactly one result but found several.
    #[error("Multiple objects returned when one expected: {0}")]
    MultipleObjectsReturned(String),

    /// A generic database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A database integrity constraint was violated (UNIQUE, FOREIGN KEY, NOT NULL).
    #[error("Integrity error: {0}")]
    IntegrityError(String),

    /// An operational database error (cannot open, pragma failure, etc.).
    #[error("Operational error: {0}")]
    OperationalError(String),

    // ── Validation ───────────────────────────────────────────────────

    /// One or more fields failed validation.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The settings describe something ormbook cannot do.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ── Security ─────────────────────────────────────────────────────

    /// Raw SQL that looks like it was built by string interpolation.
    #[error("Suspicious operation: {0}")]
    SuspiciousOperation(String),
}

impl OrmError {
    /// Returns `true` for constraint violations reported by the database.
    pub const fn is_integrity_error(&self) -> bool {
        matches!(self, Self::IntegrityError(_))
    }

    /// Returns `true` when a single-object lookup matched nothing.
    pub const fn is_does_not_exist(&self) -> bool {
        matches!(self, Self::DoesNotExist(_))
    }

    /// Returns a short, stable label for the error category.
    ///
    /// Used in structured log fields and in the CLI's JSON error output.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DoesNotExist(_) => "does_not_exist",
            Self::MultipleObjectsReturned(_) => "multiple_objects_returned",
            Self::DatabaseError(_) => "database",
            Self::IntegrityError(_) => "integrity",
            Self::OperationalError(_) => "operational",
            Self::ValidationError(_) => "validation",
            Self::ConfigurationError(_) | Self::ImproperlyConfigured(_) => "configuration",
            Self::SerializationError(_) => "serialization",
            Self::IoError(_) => "io",
            Self::SuspiciousOperation(_) => "suspicious_operation",
        }
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, OrmError>`.
pub type OrmResult<T> = Result<T, OrmError>;
