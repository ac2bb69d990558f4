//! Error types for the ctdb client SDK

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CtdbError>;

#[derive(Error, Debug)]
pub enum CtdbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Lock conflict: {0}")]
    LockConflict(String),

    #[error("Not open: {0}")]
    NotOpen(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Read-only: {0}")]
    ReadOnly(String),

    #[error("Data corruption: {0}")]
    Corruption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CtdbError {
    /// True for the lookup-miss class (table, field or index not found)
    pub fn is_not_found(&self) -> bool {
        matches!(self, CtdbError::NotFound(_))
    }
}

impl From<bincode::Error> for CtdbError {
    fn from(err: bincode::Error) -> Self {
        CtdbError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for CtdbError {
    fn from(err: serde_json::Error) -> Self {
        CtdbError::Serialization(err.to_string())
    }
}
