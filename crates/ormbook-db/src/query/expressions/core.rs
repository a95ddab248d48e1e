//! Query expressions, aggregates, and F-objects.
//!
//! # Examples
//!
//! ```
//! use ormbook_db::query::expressions::{Expression, AggregateFunc};
//!
//! // F("age") + 1
//! let expr = Expression::f("age") + Expression::value(1);
//!
//! // COUNT("id")
//! let count = Expression::count("id");
//! assert!(count.is_aggregate());
//! ```

use crate::query::compiler::Query;
use crate::value::Value;
use std::ops;

/// A query expression that produces a value in the context of a SQL query.
///
/// Used by `annotate()`, `aggregate_exec()`, and as the left-hand side of
/// HAVING conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A column reference (plain or `relation__column`).
    Col(String),
    /// A literal value, bound as a parameter.
    Value(Value),
    /// An F-expression referencing another field of the same row.
    F(String),
    /// A database function call.
    Func {
        /// Function name (e.g. "COALESCE", "UPPER").
        name: String,
        /// Function arguments.
        args: Vec<Expression>,
    },
    /// An aggregate function.
    Aggregate {
        /// The aggregate operation.
        func: AggregateFunc,
        /// The expression being aggregated.
        field: Box<Expression>,
        /// Whether to apply DISTINCT.
        distinct: bool,
    },
    /// A scalar subquery.
    Subquery(Box<Query>),
    /// Raw SQL with parameters.
    RawSQL(String, Vec<Value>),
    /// Addition.
    Add(Box<Expression>, Box<Expression>),
    /// Subtraction.
    Sub(Box<Expression>, Box<Expression>),
    /// Multiplication.
    Mul(Box<Expression>, Box<Expression>),
    /// Division.
    Div(Box<Expression>, Box<Expression>),
}

/// Aggregate function types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    /// COUNT.
    Count,
    /// SUM.
    Sum,
    /// AVG.
    Avg,
    /// MIN.
    Min,
    /// MAX.
    Max,
}

impl AggregateFunc {
    /// Returns the SQL function name for this aggregate.
    pub const fn sql_name(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

impl Expression {
    /// Creates a column reference expression.
    pub fn col(name: impl Into<String>) -> Self {
        Self::Col(name.into())
    }

    /// Creates an F-expression.
    pub fn f(name: impl Into<String>) -> Self {
        Self::F(name.into())
    }

    /// Creates a literal value expression.
    pub fn value(v: impl Into<Value>) -> Self {
        Self::Value(v.into())
    }

    /// Creates a function call expression.
    pub fn func(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::Func {
            name: name.into(),
            args,
        }
    }

    /// Creates an aggregate expression.
    pub fn aggregate(func: AggregateFunc, field: Expression) -> Self {
        Self::Aggregate {
            func,
            field: Box::new(field),
            distinct: false,
        }
    }

    /// Creates a DISTINCT aggregate expression.
    pub fn aggregate_distinct(func: AggregateFunc, field: Expression) -> Self {
        Self::Aggregate {
            func,
            field: Box::new(field),
            distinct: true,
        }
    }

    /// `COUNT(column)`; pass `"*"` for `COUNT(*)`.
    pub fn count(column: impl Into<String>) -> Self {
        Self::aggregate(AggregateFunc::Count, Self::col(column))
    }

    /// `SUM(column)`.
    pub fn sum(column: impl Into<String>) -> Self {
        Self::aggregate(AggregateFunc::Sum, Self::col(column))
    }

    /// `AVG(column)`.
    pub fn avg(column: impl Into<String>) -> Self {
        Self::aggregate(AggregateFunc::Avg, Self::col(column))
    }

    /// `MIN(column)`.
    pub fn min(column: impl Into<String>) -> Self {
        Self::aggregate(AggregateFunc::Min, Self::col(column))
    }

    /// `MAX(column)`.
    pub fn max(column: impl Into<String>) -> Self {
        Self::aggregate(AggregateFunc::Max, Self::col(column))
    }

    /// Creates a raw SQL expression.
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self::RawSQL(sql.into(), params)
    }

    /// Returns `true` if this expression contains an aggregate anywhere.
    ///
    /// A scalar subquery is self-contained and does not count.
    pub fn is_aggregate(&self) -> bool {
        match self {
            Self::Aggregate { .. } => true,
            Self::Func { args, .. } => args.iter().any(Self::is_aggregate),
            Self::Add(l, r) | Self::Sub(l, r) | Self::Mul(l, r) | Self::Div(l, r) => {
                l.is_aggregate() || r.is_aggregate()
            }
            Self::Col(_) | Self::Value(_) | Self::F(_) | Self::Subquery(_) | Self::RawSQL(..) => {
                false
            }
        }
    }
}

impl ops::Add for Expression {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::Add(Box::new(self), Box::new(rhs))
    }
}

impl ops::Sub for Expression {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::Sub(Box::new(self), Box::new(rhs))
    }
}

impl ops::Mul for Expression {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        Self::Mul(Box::new(self), Box::new(rhs))
    }
}

impl ops::Div for Expression {
    type Output = Self;
    fn div(self, rhs: Self) -> Self::Output {
        Self::Div(Box::new(self), Box::new(rhs))
    }
}
