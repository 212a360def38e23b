//! Error types for the tabq query engine.
//!
//! All public APIs return `QueryResult<T>`; library code does not panic.
//! The first error raised while evaluating a statement aborts the whole
//! statement, so a failed query never yields a partial view.

use thiserror::Error;

/// Unified error type for every query operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// Unqualified or qualified reference matching more than one column in one scope
    #[error("field {0} is ambiguous")]
    FieldAmbiguous(String),

    /// Reference that no scope frame, variable or outer frame can resolve
    #[error("field {0} does not exist")]
    FieldNotExist(String),

    /// Unknown function name
    #[error("function {0} does not exist")]
    FunctionNotExist(String),

    /// Wrong number or kind of arguments for a function
    #[error("function {name} takes {expected}")]
    FunctionArgumentError { name: String, expected: String },

    /// Incompatible operand types in comparison or arithmetic
    #[error("type mismatch in {expr}: {message}")]
    TypeMismatch { expr: String, message: String },

    /// Group cell used outside an aggregate context, or an aggregate used
    /// against records that are not grouped
    #[error("{expr}: {message}")]
    GroupedFieldMisuse { expr: String, message: String },

    /// Invalid join specification
    #[error("join condition error: {0}")]
    JoinConditionError(String),

    /// Duplicate output column name while strict column names are enforced
    #[error("field name {0} is a duplicate")]
    DuplicateColumnName(String),

    /// Exclusive access to a source table could not be obtained in time
    #[error("table {table} is locked by another operation (waited {waited_ms}ms)")]
    WriteConflict { table: String, waited_ms: u128 },

    /// Blocking wait on a shared resource expired
    #[error("timed out waiting for {resource} ({waited_ms}ms)")]
    Timeout { resource: String, waited_ms: u128 },

    /// Requested table is neither registered nor an inline table
    #[error("table {0} does not exist")]
    TableNotFound(String),

    /// Table registered twice
    #[error("table {0} already exists")]
    TableAlreadyExists(String),

    /// Number of values does not match the number of fields
    #[error("field length does not match: expected {expected}, got {actual}")]
    FieldLengthNotMatch { expected: usize, actual: usize },

    /// Set operation over results with different widths
    #[error("result set to be combined should contain exactly {left} fields, got {right}")]
    CombinedSetFieldLength { left: usize, right: usize },

    /// Scalar subquery produced more than one record
    #[error("subquery {0} returns too many records, should return only one record")]
    SubqueryTooManyRows(String),

    /// Scalar subquery produced more than one field
    #[error("subquery {0} returns too many fields, should return only one field")]
    SubqueryTooManyFields(String),

    /// LIMIT / OFFSET value is not a usable number
    #[error("invalid limit clause: {0}")]
    InvalidLimit(String),

    /// Variable referenced before DECLARE
    #[error("variable @{0} is undeclared")]
    UndeclaredVariable(String),

    /// Variable declared twice
    #[error("variable @{0} is redeclared")]
    VariableRedeclared(String),

    /// Invalid arguments or statement shape
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Configuration could not be read
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Worker pool could not be created
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// Sibling task failed; this chunk stopped early
    #[error("evaluation cancelled")]
    Cancelled,
}

/// Result type alias for all tabq operations.
pub type QueryResult<T> = Result<T, QueryError>;

impl QueryError {
    /// Replace the expression text of a value-level error with the expression
    /// being evaluated, so messages point at the offending node.
    pub(crate) fn in_expression(self, expr: &impl std::fmt::Display) -> Self {
        match self {
            QueryError::TypeMismatch { message, .. } => QueryError::TypeMismatch {
                expr: expr.to_string(),
                message,
            },
            other => other,
        }
    }
}

// From 구현들
impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Configuration(err.to_string())
    }
}
