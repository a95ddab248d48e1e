//! Query expressions, aggregates, and F-objects.
//!
//! # Submodules
//!
//! - [`core`] - Core expression types: F, Value, Func, Aggregate, Subquery, arithmetic

pub mod core;

pub use self::core::{AggregateFunc, Expression};
