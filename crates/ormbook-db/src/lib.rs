//! # ormbook-db
//!
//! The query layer behind the ormbook patterns. Provides the
//! [`Model`](model::Model) trait for mapping rows onto structs,
//! [`QuerySet`](query::QuerySet) for building and executing queries,
//! [`Manager`](query::Manager) as the model-level entry point, and the
//! expression types used by annotations and aggregates.
//!
//! ## Architecture
//!
//! A [`QuerySet`](query::QuerySet) builds a [`Query`](query::Query) AST through
//! method chaining without touching the database. SQL is only generated when a
//! terminal method (`get`, `count_exec`, `first_exec`, ...) runs, at which point
//! the [`SqlCompiler`](query::SqlCompiler) translates the AST into parameterised
//! SQL for the target backend. Everything executes through
//! [`DbExecutor`](executor::DbExecutor).
//!
//! ## Module Overview
//!
//! - [`model`] - The [`Model`](model::Model) trait, [`ModelMeta`](model::ModelMeta) and relations
//! - [`fields`] - Field definitions ([`FieldDef`](fields::FieldDef)) and types
//! - [`value`] - The backend-agnostic [`Value`](value::Value) enum
//! - [`query`] - Query building, lookups, expressions, raw SQL and compilation
//! - [`schema`] - `CREATE TABLE` generation
//! - [`transactions`] - Atomic blocks and savepoints

// These clippy lints are intentionally allowed for the ORM crate:
// - struct_excessive_bools: FieldDef carries several column flags
// - too_many_lines: The SQL compiler methods are inherently large due to many match arms
// - result_large_err: OrmError is the crate-wide error type and is used consistently
// - format_push_string: format! with push_str is clearer than write! for SQL generation
// - doc_markdown: backtick requirements for documentation items are too strict
// - return_self_not_must_use: builder pattern methods are self-documenting
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::result_large_err)]
#![allow(clippy::format_push_string)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::match_same_arms)]
// significant_drop_tightening: false positives with async Mutex guards
#![allow(clippy::significant_drop_tightening)]

pub mod executor;
pub mod fields;
pub mod model;
pub mod query;
pub mod schema;
pub mod transactions;
pub mod value;

// Re-export the most commonly used types at the crate root.
pub use executor::{create_model, delete_model, refresh_model, save_model, DbExecutor};
pub use fields::{FieldDef, FieldType, OnDelete};
pub use model::{Model, ModelMeta, Relation};
pub use query::raw::{RawQuerySet, RawSql};
pub use query::{
    AggregateFunc, DatabaseBackendType, Expression, FromValue, Join, JoinType, Lookup, Manager,
    OrderBy, Query, QuerySet, Row, SelectColumn, SqlCompiler, WhereNode, Q,
};
pub use schema::SchemaEditor;
pub use transactions::{atomic, Savepoint, TransactionManager};
pub use value::Value;
