//! # ormbook
//!
//! Twenty ORM query patterns against a `User` model and its `Profile`,
//! written with the `ormbook-db` query layer and run on SQLite.
//!
//! ## Modules
//!
//! - [`models`] - The `User` and `Profile` models
//! - [`schema`] - Creating and dropping the two tables
//! - [`fixtures`] - Deterministic demo data
//! - [`patterns`] - The twenty patterns, one async function each
//! - [`catalog`] - The numbered index and a runner used by the CLI
//! - [`dry_run`] - An executor that records SQL without running it

pub mod catalog;
pub mod dry_run;
pub mod fixtures;
pub mod models;
pub mod patterns;
pub mod schema;

pub use catalog::{Pattern, PatternCatalog, PATTERNS};
pub use models::{Profile, User};
