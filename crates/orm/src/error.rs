//! Error types for the ORM system
//!
//! One taxonomy for the whole data-access layer: validation failures that
//! never reach the connection, bad-call errors for misused APIs, state
//! errors for violated runtime preconditions, and a single database error
//! kind wrapping whatever the backend reported.

use std::fmt;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Database connection or query error, re-raised at the execution boundary
    Database(String),
    /// Record not found in the named table
    NotFound(String),
    /// Input validation failed before the operation reached the connection
    Validation(String),
    /// Primary key is missing on a record that needs one
    MissingPrimaryKey(String),
    /// Relationship misuse: undeclared relation name, missing pivot metadata
    Relationship(String),
    /// Query building error
    Query(String),
    /// Invalid registry or metadata configuration
    Configuration(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Database(msg) => write!(f, "Database error: {}", msg),
            ModelError::NotFound(table) => write!(f, "Record not found in table '{}'", table),
            ModelError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ModelError::MissingPrimaryKey(msg) => {
                write!(f, "Primary key is missing or invalid: {}", msg)
            }
            ModelError::Relationship(msg) => write!(f, "Relationship error: {}", msg),
            ModelError::Query(msg) => write!(f, "Query error: {}", msg),
            ModelError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Query(err.to_string())
    }
}
