// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for query specification resolution and execution
//!
//! Resolution errors are fatal to compiling a query and carry the rendered
//! SQL of the offending expression. Execution errors abort the in-flight
//! materialization only; the compiled query stays valid.

use thiserror::Error;

/// Result type alias for query operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for query resolution and execution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Reference errors
    // =========================================================================
    /// Column reference matches more than one range
    #[error("ambiguous column reference: {0}")]
    AmbiguousColumn(String),

    /// Column reference matches no range in scope
    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    /// Qualified wildcard or column names an unknown range
    #[error("table '{0}' not found")]
    TableNotFound(String),

    /// GROUP BY name matches more than one SELECT alias
    #[error("group by expression is ambiguous: {0}")]
    AmbiguousGroupByAlias(String),

    // =========================================================================
    // Type errors
    // =========================================================================
    /// Join condition or WHERE clause is not boolean
    #[error("predicate must be boolean: {0}")]
    NonBooleanPredicate(String),

    /// Row-valued expression in the select list
    #[error("row value not allowed in select list: {0}")]
    RowValuedColumn(String),

    /// Two types cannot be combined into a common type
    #[error("incompatible data types {left} and {right}")]
    IncompatibleTypes { left: String, right: String },

    /// Column type could not be determined under strict typing
    #[error("data type of column cannot be determined: {0}")]
    UntypedColumn(String),

    /// Array element type could not be determined
    #[error("array element type cannot be determined: {0}")]
    UnknownArrayElementType(String),

    /// Operand type does not suit the operator or function
    #[error("type mismatch in {context}: {detail}")]
    TypeMismatch { context: String, detail: String },

    /// Invalid argument for a function
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Function name not found in the registry
    #[error("function '{0}' not found")]
    FunctionNotFound(String),

    // =========================================================================
    // Grouping errors
    // =========================================================================
    /// Aggregate function inside a GROUP BY expression
    #[error("aggregate function not allowed in GROUP BY: {0}")]
    AggregateInGroupBy(String),

    /// SELECT or ORDER BY expression not derivable from the grouping
    #[error("expression not in aggregate or GROUP BY columns: {0}")]
    NotInGroupBy(String),

    /// HAVING expression not derivable from the grouping
    #[error("invalid HAVING expression: {0}")]
    InvalidHaving(String),

    /// ORDER BY expression not in the select list when required
    #[error("invalid ORDER BY expression: {0}")]
    InvalidOrderBy(String),

    /// Aggregate over local columns in a WHERE clause
    #[error("aggregate function not allowed in WHERE clause: {0}")]
    MisplacedAggregate(String),

    /// Aggregate in a nested WHERE clause referencing an enclosing query
    #[error("aggregate function in WHERE clause refers to columns of an unrelated table: {0}")]
    UnrelatedAggregate(String),

    // =========================================================================
    // Cardinality errors
    // =========================================================================
    /// Explicit column name list length differs from the select list
    #[error("column count does not match, expected {expected}, got {got}")]
    ColumnCountMismatch { expected: usize, got: usize },

    /// Scalar subquery produced more than one row
    #[error("scalar subquery returned more than one row")]
    SubqueryCardinality,

    /// Scalar subquery produced more than one column
    #[error("scalar subquery must return exactly one column, got {0}")]
    SubqueryDegree(usize),

    // =========================================================================
    // Execution errors
    // =========================================================================
    /// Division by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Value cannot be converted to the target type
    #[error("cannot convert {from} to {to}")]
    TypeConversion { from: String, to: String },

    /// Integer arithmetic overflowed
    #[error("numeric value out of range")]
    NumericOverflow,

    /// OFFSET or LIMIT evaluated to NULL or a negative number
    #[error("invalid {clause} value: {value}")]
    InvalidLimit { clause: &'static str, value: String },

    /// Execution was cancelled through the context
    #[error("query cancelled")]
    QueryCancelled,

    /// Positional parameter was not bound
    #[error("parameter ${0} not bound")]
    MissingParameter(usize),

    /// Expression evaluation failed
    #[error("expression evaluation failed: {0}")]
    ExpressionEvaluation(String),

    // =========================================================================
    // Constraint errors
    // =========================================================================
    /// NOT NULL constraint violation
    #[error("not null constraint failed for column {column}")]
    NotNullConstraint { column: String },

    /// Unique constraint violation
    #[error("unique constraint failed for index {index} with value {value}")]
    UniqueConstraint { index: String, value: String },

    // =========================================================================
    // Lifecycle errors
    // =========================================================================
    /// Operation requires a completed resolution pass
    #[error("query not resolved: {0}")]
    NotResolved(&'static str),

    /// Internal error
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new IncompatibleTypes error
    pub fn incompatible_types(left: impl ToString, right: impl ToString) -> Self {
        Error::IncompatibleTypes {
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    /// Create a new TypeMismatch error
    pub fn type_mismatch(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::TypeMismatch {
            context: context.into(),
            detail: detail.into(),
        }
    }

    /// Create a new TypeConversion error
    pub fn type_conversion(from: impl Into<String>, to: impl Into<String>) -> Self {
        Error::TypeConversion {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a new InvalidLimit error
    pub fn invalid_limit(clause: &'static str, value: impl ToString) -> Self {
        Error::InvalidLimit {
            clause,
            value: value.to_string(),
        }
    }

    /// Create a new NotNullConstraint error
    pub fn not_null_constraint(column: impl Into<String>) -> Self {
        Error::NotNullConstraint {
            column: column.into(),
        }
    }

    /// Create a new InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Create a new ExpressionEvaluation error
    pub fn expression_evaluation(message: impl Into<String>) -> Self {
        Error::ExpressionEvaluation(message.into())
    }

    /// Check if this is a name resolution error
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            Error::AmbiguousColumn(_)
                | Error::ColumnNotFound(_)
                | Error::TableNotFound(_)
                | Error::AmbiguousGroupByAlias(_)
        )
    }

    /// Check if this is a typing error
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            Error::NonBooleanPredicate(_)
                | Error::RowValuedColumn(_)
                | Error::IncompatibleTypes { .. }
                | Error::UntypedColumn(_)
                | Error::UnknownArrayElementType(_)
                | Error::TypeMismatch { .. }
                | Error::InvalidArgument(_)
                | Error::FunctionNotFound(_)
        )
    }

    /// Check if this is a grouping rule violation
    pub fn is_grouping_error(&self) -> bool {
        matches!(
            self,
            Error::AggregateInGroupBy(_)
                | Error::NotInGroupBy(_)
                | Error::InvalidHaving(_)
                | Error::InvalidOrderBy(_)
                | Error::MisplacedAggregate(_)
                | Error::UnrelatedAggregate(_)
        )
    }

    /// Check if this error is raised while compiling a query
    pub fn is_resolution_error(&self) -> bool {
        self.is_reference_error()
            || self.is_type_error()
            || self.is_grouping_error()
            || matches!(self, Error::ColumnCountMismatch { .. })
    }

    /// Check if this error is raised while executing a query
    pub fn is_execution_error(&self) -> bool {
        matches!(
            self,
            Error::DivisionByZero
                | Error::TypeConversion { .. }
                | Error::NumericOverflow
                | Error::InvalidLimit { .. }
                | Error::QueryCancelled
                | Error::MissingParameter(_)
                | Error::ExpressionEvaluation(_)
                | Error::SubqueryCardinality
                | Error::SubqueryDegree(_)
        )
    }
}
